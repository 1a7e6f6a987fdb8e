//! Till configuration
//!
//! Read from environment variables (optionally seeded from `.env`) once at
//! startup.

use std::path::PathBuf;

use till_printer::{DEFAULT_BAUD_RATES, ValidationOptions};

use crate::printing::ReceiptFormatter;

/// Till configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | PRINTER_PROFILES | printers.json | printer profile document |
/// | BUSINESS_NAME | My Store | receipt header |
/// | CURRENCY_SYMBOL | $ | money prefix |
/// | ALLOWED_BAUD_RATES | 9600,19200,38400,57600,115200 | serial baud allow-list |
/// | LOG_LEVEL | info | log level |
/// | LOG_DIR | (unset) | daily rolling log file directory |
///
/// # Example
///
/// ```ignore
/// PRINTER_PROFILES=/etc/till/printers.json BUSINESS_NAME="Corner Cafe" till check
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub profiles_path: PathBuf,
    pub business_name: String,
    pub currency_symbol: String,
    pub allowed_baud_rates: Vec<u32>,
    pub log_level: String,
    /// Log to stderr only when unset
    pub log_dir: Option<String>,
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            profiles_path: lookup("PRINTER_PROFILES")
                .unwrap_or_else(|| "printers.json".into())
                .into(),
            business_name: lookup("BUSINESS_NAME").unwrap_or_else(|| "My Store".into()),
            currency_symbol: lookup("CURRENCY_SYMBOL").unwrap_or_else(|| "$".into()),
            allowed_baud_rates: lookup("ALLOWED_BAUD_RATES")
                .map(|v| parse_baud_rates(&v))
                .filter(|rates| !rates.is_empty())
                .unwrap_or_else(|| DEFAULT_BAUD_RATES.to_vec()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_dir: lookup("LOG_DIR").filter(|d| !d.trim().is_empty()),
        }
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            allowed_baud_rates: self.allowed_baud_rates.clone(),
        }
    }

    pub fn formatter(&self) -> ReceiptFormatter {
        ReceiptFormatter::new(&self.business_name).with_currency(&self.currency_symbol)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Comma-separated baud rates; unparseable entries are skipped
fn parse_baud_rates(value: &str) -> Vec<u32> {
    value
        .split(',')
        .filter_map(|rate| rate.trim().parse().ok())
        .filter(|rate| *rate > 0)
        .collect()
}
