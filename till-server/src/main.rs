use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use shared::SaleRecord;
use till_printer::plain_text;
use till_server::utils::init_logger_with_file;
use till_server::{Config, PrinterManager, ProfileRegistry};

/// Till - receipt printing for point-of-sale printers
#[derive(Parser, Debug)]
#[command(name = "till")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Printer profile document
    #[arg(long, global = true, env = "PRINTER_PROFILES", value_name = "FILE")]
    profiles: Option<PathBuf>,

    /// Business name printed at the top of receipts
    #[arg(long, global = true, env = "BUSINESS_NAME")]
    business_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the printer profiles and show each fallback chain
    Check,

    /// Show the receipt text for a sale without printing
    Preview {
        /// Sale record (JSON)
        #[arg(long, value_name = "FILE")]
        sale: PathBuf,
    },

    /// Print a sale on a printer profile
    Print {
        /// Sale record (JSON)
        #[arg(long, value_name = "FILE")]
        sale: PathBuf,

        /// Printer profile name
        #[arg(long)]
        profile: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.profiles {
        config.profiles_path = path;
    }
    if let Some(name) = cli.business_name {
        config.business_name = name;
    }

    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    match run(cli.command, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &Config) -> anyhow::Result<bool> {
    match command {
        Commands::Check => {
            let registry = load_registry(config)?;
            println!(
                "{} printer profile(s) in {}",
                registry.len(),
                config.profiles_path.display()
            );
            for name in registry.names() {
                let chain: Vec<String> = registry
                    .chain(name)
                    .iter()
                    .map(|p| format!("{} ({})", p.name, p.transport))
                    .collect();
                println!("  {}", chain.join(" -> "));
            }
            Ok(true)
        }
        Commands::Preview { sale } => {
            let sale = load_sale(&sale)?;
            let commands = config
                .formatter()
                .format(&sale)
                .with_context(|| format!("cannot format sale {}", sale.order_id))?;
            print!("{}", plain_text(&commands));
            Ok(true)
        }
        Commands::Print { sale, profile } => {
            let sale = load_sale(&sale)?;
            let registry = load_registry(config)?;
            let manager = PrinterManager::new(Arc::new(registry), config.formatter());

            let result = manager.print_receipt(&sale, &profile).await;
            if result.success {
                println!("{}", result.message);
            } else {
                eprintln!(
                    "Print failed ({:?}): {}",
                    result.error_kind, result.message
                );
            }
            Ok(result.success)
        }
    }
}

fn load_registry(config: &Config) -> anyhow::Result<ProfileRegistry> {
    ProfileRegistry::load(&config.profiles_path, &config.validation_options())
        .context("invalid printer configuration")
}

fn load_sale(path: &Path) -> anyhow::Result<SaleRecord> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read sale {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid sale record {}", path.display()))
}
