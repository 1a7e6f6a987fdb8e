//! Shared types for the till printing stack
//!
//! Plain data consumed by the printer core: sale records handed over by the
//! POS application and the raw printer profile document read from the
//! configuration store. Nothing here performs I/O or validation.

pub mod models;

// Re-exports
pub use models::{LineItem, ProfileDocument, RawProfile, SaleRecord};
pub use serde::{Deserialize, Serialize};
