pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod exclude;
pub mod hash;
pub mod restore;
pub mod scan;
pub mod store;

use anyhow::Result;
use clap::Parser;

pub const VERSION: &str = "v0.1.0";

pub fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}