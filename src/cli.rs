use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskrelay")]
#[command(about = "External task worker relaying engine jobs to HTTP services", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the configured workers until interrupted
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Path to the TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}
