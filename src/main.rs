use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxcache::cli::setup::setup;
use fxcache::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fxcache::AppCommand {
    fn from(cmd: Commands) -> fxcache::AppCommand {
        match cmd {
            Commands::Convert { amount, from, to } => {
                fxcache::AppCommand::Convert { amount, from, to }
            }
            Commands::Bulk { to, items } => fxcache::AppCommand::Bulk { items, to },
            Commands::Pay { amount, from, to } => fxcache::AppCommand::Pay { amount, from, to },
            Commands::Currency { code } => fxcache::AppCommand::Currency { code },
            Commands::Currencies => fxcache::AppCommand::Currencies,
            Commands::Rates => fxcache::AppCommand::Rates,
            Commands::Invalidate => fxcache::AppCommand::Invalidate,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount for display
    Convert {
        amount: f64,
        from: String,
        /// Target currency, defaults to the selected display currency
        to: Option<String>,
    },
    /// Convert a list of prices, given as AMOUNT:CURRENCY
    Bulk {
        #[arg(short, long)]
        to: Option<String>,
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Quote a payment amount against fresh rates
    Pay {
        amount: f64,
        from: String,
        to: String,
    },
    /// Show or select the display currency
    Currency { code: Option<String> },
    /// List supported currencies
    Currencies,
    /// Show the cached rate table
    Rates,
    /// Drop cached rates
    Invalidate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => fxcache::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
