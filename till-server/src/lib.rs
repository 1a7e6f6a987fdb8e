//! Till receipt printing service
//!
//! Turns sale records into receipts and delivers them to USB, serial or
//! network printers through named profiles with fallback chains.
//!
//! ```ignore
//! let config = Config::from_env();
//! let registry = ProfileRegistry::load(&config.profiles_path, &config.validation_options())?;
//! let manager = PrinterManager::new(Arc::new(registry), config.formatter());
//! let result = manager.print_receipt(&sale, "front-usb").await;
//! ```

pub mod core;
pub mod printing;
pub mod utils;

pub use crate::core::Config;
pub use printing::{
    PrintErrorKind, PrintEvent, PrintEventSink, PrintHandle, PrintResult, PrintTicket,
    PrintWorker, PrinterManager, PrinterProfile, ProfileRegistry, ReceiptFormatter,
    RegistryError,
};
