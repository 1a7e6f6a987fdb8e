//! Data models
//!
//! Shared between till-printer and till-server.

pub mod printer_profile;
pub mod sale;

// Re-exports
pub use printer_profile::*;
pub use sale::*;
