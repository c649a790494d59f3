// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard - a pluggable chat bot bridge.
//!
//! This is the binary entry point for the bridge.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use switchboard_config::{ConfigError, SwitchboardConfig};

/// Switchboard - a pluggable chat bot bridge.
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the usual locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bridge until interrupted.
    Serve,
    /// Validate the configuration and exit.
    Check {
        /// Print the effective configuration as TOML.
        #[arg(long)]
        print: bool,
    },
}

fn load(path: Option<&PathBuf>) -> Result<SwitchboardConfig, Vec<ConfigError>> {
    match path {
        Some(path) => switchboard_config::load_and_validate_path(path),
        None => switchboard_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            switchboard_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("switchboard: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Check { print }) => {
            if print {
                match toml::to_string_pretty(&config) {
                    Ok(rendered) => print!("{rendered}"),
                    Err(e) => {
                        eprintln!("switchboard: cannot render config: {e}");
                        std::process::exit(1);
                    }
                }
            } else {
                println!(
                    "switchboard: config OK (database={}, refresh={}s)",
                    config.storage.database_path, config.bus.refresh_secs
                );
            }
        }
        None => {
            println!("switchboard: use --help for available commands");
        }
    }
}
