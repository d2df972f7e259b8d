//! IP Mapper
//!
//! Annotating reverse proxy built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────────┐
//!                     │                        IP MAPPER                         │
//!                     │                                                          │
//!   Client Request    │  ┌──────────┐   ┌──────────┐   ┌─────────┐  ┌─────────┐  │
//!   ──────────────────┼─▶│  strip   │──▶│ client   │──▶│ subnet  │─▶│ inject  │──┼──▶ Upstream
//!                     │  │  label   │   │ IP       │   │ matcher │  │ labels  │  │
//!                     │  │  header  │   │ resolver │   └────▲────┘  └─────────┘  │
//!                     │  └──────────┘   └──────────┘        │                    │
//!                     │                                ┌────┴─────┐              │
//!                     │                                │ mapping  │◀── mapping   │
//!                     │                                │ store    │    file      │
//!                     │                                └──────────┘              │
//!                     └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Any failure (unreadable mapping, bad client address) passes the request
//! through unannotated.

use std::error::Error;
use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ip_mapper::cli;
use ip_mapper::config::load_config;
use ip_mapper::lifecycle::{self, Shutdown};
use ip_mapper::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "ip-mapper")]
#[command(about = "Label requests by client network before they reach your service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the annotating proxy
    Serve {
        #[arg(short, long, default_value = "ip-mapper.toml")]
        config: PathBuf,
    },
    /// Print the labels an address maps to
    Check {
        #[arg(short, long)]
        mapping: PathBuf,

        #[arg(long)]
        ip: IpAddr,

        /// Print JSON instead of the header value
        #[arg(long)]
        json: bool,
    },
    /// Validate the service config and its mapping file
    Validate {
        #[arg(short, long, default_value = "ip-mapper.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    match args.command {
        Commands::Serve { config } => {
            let config = load_config(&config)?;
            init_logging(&config.observability.log_level);
            tracing::info!("ip-mapper v{} starting", env!("CARGO_PKG_VERSION"));

            let shutdown = Shutdown::new();
            shutdown.trigger_on_signal();
            lifecycle::run(config, shutdown).await?;
        }
        Commands::Check { mapping, ip, json } => {
            init_logging("warn");
            let report = cli::check(&mapping, ip)?;
            println!("{}", report.render(json)?);
        }
        Commands::Validate { config } => {
            init_logging("warn");
            println!("{}", cli::validate(&config)?);
        }
    }

    Ok(())
}
