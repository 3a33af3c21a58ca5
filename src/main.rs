use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fincalc::core::log::init_logging;
use rust_decimal::Decimal;

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

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display financial ratios for one or more tickers
    Ratios {
        #[arg(required = true)]
        tickers: Vec<String>,
    },
    /// Watch the configured tickers for price alerts
    Watch {
        /// Check once and exit
        #[arg(long)]
        once: bool,
    },
    /// Compound annual growth between two prices
    Growth {
        #[arg(long)]
        start_year: i32,
        #[arg(long)]
        end_year: i32,
        #[arg(long)]
        start_price: Decimal,
        #[arg(long)]
        end_price: Decimal,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config_path.as_deref();
    let result = match cli.command {
        Some(Commands::Setup) => fincalc::cli::setup::setup(),
        Some(Commands::Ratios { tickers }) => {
            fincalc::run_command(fincalc::AppCommand::Ratios { tickers }, config_path).await
        }
        Some(Commands::Watch { once }) => {
            fincalc::run_command(fincalc::AppCommand::Watch { once }, config_path).await
        }
        Some(Commands::Growth {
            start_year,
            end_year,
            start_price,
            end_price,
        }) => fincalc::cli::growth::run(start_year, end_year, start_price, end_price),
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
