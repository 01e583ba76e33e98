//! CLI argument definitions for mpm.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "mpm",
    version,
    about = "A minimal package manager for npm registries"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve, lock and install the project's dependencies
    #[command(visible_alias = "i")]
    Install {
        /// Packages to add to package.json before installing
        packages: Vec<String>,
        /// Skip devDependencies
        #[arg(long)]
        production: bool,
        /// Add the packages to devDependencies
        #[arg(short = 'D', long)]
        save_dev: bool,
    },
}

/// Parse command-line arguments into a [`Cli`] struct.
pub fn parse() -> Cli {
    Cli::parse()
}
