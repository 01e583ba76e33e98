pub mod ops_install;
