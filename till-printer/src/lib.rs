//! # till-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - Transport configuration and its validation
//! - USB, serial and network (TCP port 9100) connectors
//! - Formatting commands and their ESC/POS encoding
//! - GBK encoding and column-width helpers for receipts
//!
//! Business logic (WHAT to print, which printer, what to do on failure)
//! lives in till-server.
//!
//! ## Example
//!
//! ```ignore
//! use till_printer::{
//!     Align, Connector, FormatCommand, PrinterConnector, Style, TransportConfig,
//!     ValidationOptions, encode,
//! };
//!
//! let config = TransportConfig::from_raw(&raw_profile, &ValidationOptions::default())?;
//!
//! let commands = vec![
//!     FormatCommand::style(Style::default().align(Align::Center).bold(true).height(2)),
//!     FormatCommand::text("Corner Cafe\n"),
//!     FormatCommand::Cut,
//! ];
//!
//! let mut connector = Connector::new(&config);
//! connector.open().await?;
//! let result = connector.send(&encode(&commands)).await;
//! connector.close().await;
//! result?;
//! ```

mod command;
mod config;
mod connector;
mod encoding;
mod error;
mod escpos;

// Re-exports
pub use command::{Align, FormatCommand, Style, encode, plain_text};
pub use config::{
    DEFAULT_BAUD_RATES, DEFAULT_NETWORK_PORT, NetworkConfig, Parity, SerialConfig,
    TransportConfig, UsbConfig, ValidationOptions,
};
pub use connector::{
    Connector, ConnectorFactory, HardwareConnectors, NetworkConnector, PrinterConnector,
    SerialConnector, UsbConnector,
};
pub use encoding::{
    REPLACEMENT_CHAR, char_width, convert_to_gbk, display_width, fit_column, pad_width, printable,
    truncate_width,
};
pub use error::{ConfigError, TransportError, TransportErrorKind, TransportResult};
pub use escpos::EscPosBuilder;
