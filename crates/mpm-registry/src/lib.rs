//! npm registry protocol: manifest fetching, tarball download, integrity
//! verification, and unpacking into `node_modules`.

pub mod download;
pub mod install;
pub mod registry;
