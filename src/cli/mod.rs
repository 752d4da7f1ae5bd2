use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod config;
pub mod version;

#[derive(Parser)]
#[command(name = "wamd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the wamd messaging session gateway", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the gateway configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Config file path (default: ~/.config/wamd/config.toml)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration, including WAMD_* overrides
    Show {
        /// Config file path (default: ~/.config/wamd/config.toml)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => config::init(path, force),
            ConfigAction::Show { path } => config::show(path),
        },
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
