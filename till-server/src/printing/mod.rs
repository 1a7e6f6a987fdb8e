//! Receipt printing
//!
//! - `formatter`: sale record -> printer commands
//! - `registry`: validated printer profiles and fallback chains
//! - `manager`: print orchestration (fallback, retry, device locks)
//! - `worker`: background dispatch queue
//! - `events`: failure event sinks

pub mod events;
pub mod formatter;
pub mod manager;
pub mod registry;
pub mod types;
pub mod worker;

pub use events::{MemoryEventSink, PrintEventSink, TracingEventSink};
pub use formatter::{
    FormatError, FormatResult, NAME_COLUMN, PRICE_COLUMN, QTY_COLUMN, ReceiptFormatter,
    round_money, validate_sale,
};
pub use manager::PrinterManager;
pub use registry::{PrinterProfile, ProfileRegistry, RegistryError, RegistryResult};
pub use types::{PrintErrorKind, PrintEvent, PrintResult};
pub use worker::{DEFAULT_MAX_IN_FLIGHT, PrintHandle, PrintTicket, PrintWorker};
