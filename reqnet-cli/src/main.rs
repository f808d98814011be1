//! ReqNet CLI
//!
//! Command-line interface for signing and inspecting payment requests, and
//! for running request lifecycles against an in-memory ledger.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod ui;

use commands::ExtensionKind;

#[derive(Parser)]
#[command(name = "reqnet")]
#[command(about = "ReqNet CLI - Sign, inspect and simulate payment requests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom storage directory
    #[arg(long, global = true, env = "REQNET_DIR")]
    storage_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new signing identity
    Keygen {
        /// Replace an existing identity
        #[arg(long)]
        force: bool,
    },

    /// Show the address of the current identity
    Address,

    /// Sign a request as its primary payee
    Sign {
        /// Expected amount for each payee, primary first
        #[arg(short, long = "amount", required = true, num_args = 1..)]
        amounts: Vec<String>,

        /// Sub-payee addresses, in slot order
        #[arg(long = "sub-payee")]
        sub_payees: Vec<String>,

        /// Extension the request must be broadcast to
        #[arg(short, long, value_enum, default_value = "native")]
        extension: ExtensionKind,

        /// Only this payer may redeem the request
        #[arg(long)]
        payer: Option<String>,

        /// Free-form request data
        #[arg(short, long, default_value = "")]
        data: String,

        /// Lifetime in seconds (defaults to the configured lifetime)
        #[arg(long)]
        lifetime: Option<i64>,

        /// Print only the transport string
        #[arg(long)]
        raw: bool,
    },

    /// Decode and verify a signed request
    Inspect {
        /// Transport string (reqnet:...)
        transport: String,

        /// Verify as of this unix time instead of now
        #[arg(long)]
        at: Option<i64>,
    },

    /// Manage the ledger configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run a request lifecycle on an in-memory ledger
    Simulate {
        /// Scenario to run
        #[arg(value_enum)]
        scenario: commands::simulate::Scenario,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration, environment overrides included
    Show,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "reqnet=debug" } else { "reqnet=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let storage_dir = cli.storage_dir.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reqnet")
    });
    tracing::debug!(storage_dir = %storage_dir.display(), "using storage directory");

    match cli.command {
        Commands::Keygen { force } => {
            commands::keygen::run(&storage_dir, force, cli.verbose)?;
        }
        Commands::Address => {
            commands::address::run(&storage_dir)?;
        }
        Commands::Sign {
            amounts,
            sub_payees,
            extension,
            payer,
            data,
            lifetime,
            raw,
        } => {
            let args = commands::sign::SignArgs {
                amounts,
                sub_payees,
                extension,
                payer,
                data,
                lifetime,
                raw,
            };
            commands::sign::run(&storage_dir, args)?;
        }
        Commands::Inspect { transport, at } => {
            commands::inspect::run(&storage_dir, &transport, at)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => {
                commands::config::init(&storage_dir, force)?;
            }
            ConfigAction::Show => {
                commands::config::show(&storage_dir)?;
            }
        },
        Commands::Simulate { scenario } => {
            commands::simulate::run(&storage_dir, scenario, cli.verbose)?;
        }
    }

    Ok(())
}
