//! Command dispatch and handler modules.

mod install;

use miette::Result;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Install {
            packages,
            production,
            save_dev,
        } => install::exec(packages, production, save_dev, cli.verbose),
    }
}
