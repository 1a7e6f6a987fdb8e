//! Printer Profile Document
//!
//! The unvalidated shape of the profile configuration as it comes out of the
//! configuration store. Transport fields are kept as loose JSON values here;
//! `till-printer` turns them into a typed `TransportConfig` or rejects them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One named printer entry before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProfile {
    /// Transport kind: "usb" | "serial" | "network"
    pub device_type: String,
    /// Name of the profile to try when this one cannot connect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Transport-specific fields (vendor_id, device, host, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawProfile {
    pub fn new(device_type: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
            ..Default::default()
        }
    }

    /// Set a transport field (builder style, mostly for tests and tooling)
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn with_fallback(mut self, name: impl Into<String>) -> Self {
        self.fallback = Some(name.into());
        self
    }
}

/// Mapping from profile name to raw profile, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileDocument {
    pub profiles: BTreeMap<String, RawProfile>,
}

impl ProfileDocument {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn insert(&mut self, name: impl Into<String>, profile: RawProfile) {
        self.profiles.insert(name.into(), profile);
    }
}
