//! Handler for `mpm install`.

use miette::Result;
use mpm_ops::ops_install::{self, InstallOptions};
use mpm_util::errors::MpmError;

pub fn exec(packages: Vec<String>, production: bool, save_dev: bool, verbose: bool) -> Result<()> {
    let cwd = std::env::current_dir().map_err(MpmError::Io)?;

    let opts = InstallOptions {
        packages,
        save_dev,
        production,
        verbose,
    };

    let rt = tokio::runtime::Runtime::new().map_err(|e| MpmError::Generic {
        message: format!("Failed to start async runtime: {e}"),
    })?;

    rt.block_on(ops_install::install(&cwd, &opts))?;
    Ok(())
}
