//! # tienda-cli
//!
//! CLI tool for exercising the tienda sync engine against its in-memory
//! backends.
//!
//! ## Commands
//!
//! - `config`: Show the effective configuration
//! - `probe`: Run connection establishment, optionally against a faulty store
//! - `demo`: Walk through register, profile, inventory and sign-out
//!
//! ## Example
//!
//! ```bash
//! # Establish against a store whose probe never answers
//! tienda-cli probe --hang --fail-enable
//!
//! # Full walkthrough with debug logs
//! RUST_LOG=debug tienda-cli demo
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tienda_client::ClientConfig;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{config, demo, probe};

/// CLI tool for exercising the tienda sync engine.
#[derive(Parser, Debug)]
#[command(name = "tienda-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults apply when omitted
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the effective configuration
    Config,

    /// Establish a connection against the in-memory store
    Probe {
        /// Make the health probe never answer
        #[arg(long)]
        hang: bool,

        /// Make the first probe fail
        #[arg(long)]
        fail_probe: bool,

        /// Make disabling the network fail
        #[arg(long)]
        fail_disable: bool,

        /// Make enabling the network fail
        #[arg(long)]
        fail_enable: bool,

        /// Press "retry" this many times after a failure
        #[arg(long, default_value = "0")]
        retries: u32,
    },

    /// Register, fill in the profile, manage inventory, sign out
    Demo {
        /// Account email
        #[arg(long, default_value = "demo@tienda.mx")]
        email: String,

        /// Products to add, as NAME=PRICE
        #[arg(long = "product", value_name = "NAME=PRICE")]
        products: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let client_config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Config => {
            config::run(&client_config, cli.config.as_deref());
        }
        Commands::Probe {
            hang,
            fail_probe,
            fail_disable,
            fail_enable,
            retries,
        } => {
            let faults = probe::Faults {
                hang,
                fail_probe,
                fail_disable,
                fail_enable,
            };
            probe::run(client_config, faults, retries).await?;
        }
        Commands::Demo { email, products } => {
            demo::run(client_config, &email, &products).await?;
        }
    }

    Ok(())
}

/// Load the configuration file, or defaults when none was given.
fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(ClientConfig::default()),
    }
}
