//! fsfailover CLI
//!
//! Command-line tools for failover storage groups.
//!
//! # Commands
//!
//! - `sync` - Reconcile the backends of a group
//! - `groups` - List configured groups and their backends
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// fsfailover command-line tools.
#[derive(Parser)]
#[command(name = "fsfailover")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replicate every file of the primary storage to the others
    Sync {
        /// Failover group to reconcile (optional when only one is configured)
        group: Option<String>,

        /// How to handle extra files in secondary storages (ignore, delete, copy)
        #[arg(short, long, default_value = "ignore")]
        extra_files: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List configured failover groups
    Groups {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sync {
            group,
            extra_files,
            format,
        } => {
            let config = cli.config.ok_or("Configuration file required for sync")?;
            commands::sync::run(&config, group.as_deref(), &extra_files, &format)?;
        }
        Commands::Groups { format } => {
            let config = cli.config.ok_or("Configuration file required for groups")?;
            commands::groups::run(&config, &format)?;
        }
        Commands::Version => {
            println!("fsfailover CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("fsfailover core v{}", fsfailover_core::VERSION);
        }
    }

    Ok(())
}
