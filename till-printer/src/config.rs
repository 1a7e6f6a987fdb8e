//! Transport configuration
//!
//! Turns a loosely-typed profile entry into a strongly-typed
//! [`TransportConfig`], rejecting bad data eagerly with a [`ConfigError`]
//! that names the offending field. Validation is a pure function of its
//! input: no device is touched here.

use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value};
use shared::RawProfile;

use crate::error::ConfigError;

/// Default raw TCP printing port
pub const DEFAULT_NETWORK_PORT: u16 = 9100;

/// Baud rates accepted when no allow-list is configured
pub const DEFAULT_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200];

const DEFAULT_USB_TIMEOUT_MS: u64 = 5000;
const DEFAULT_TIMEOUT_SECS: f64 = 5.0;
const DEFAULT_BAUD_RATE: u32 = 9600;

/// Knobs that validation depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOptions {
    pub allowed_baud_rates: Vec<u32>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            allowed_baud_rates: DEFAULT_BAUD_RATES.to_vec(),
        }
    }
}

/// USB printer (bulk OUT endpoint)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub in_endpoint: u8,
    pub out_endpoint: u8,
    pub interface: u8,
    pub timeout: Duration,
}

/// Serial line parity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Serial (RS-232 / virtual COM) printer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub device: String,
    pub baud_rate: u32,
    pub byte_size: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    pub timeout: Duration,
}

/// Raw TCP printer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

/// How to reach one printer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    Usb(UsbConfig),
    Serial(SerialConfig),
    Network(NetworkConfig),
}

impl TransportConfig {
    /// Validate a raw profile entry
    pub fn from_raw(raw: &RawProfile, options: &ValidationOptions) -> Result<Self, ConfigError> {
        let fields = Fields(&raw.fields);
        match raw.device_type.trim().to_ascii_lowercase().as_str() {
            "usb" => Self::usb(&fields),
            "serial" => Self::serial(&fields, options),
            "network" => Self::network(&fields),
            other => Err(ConfigError::UnknownDeviceType(other.to_string())),
        }
    }

    fn usb(fields: &Fields<'_>) -> Result<Self, ConfigError> {
        // Endpoint direction bits are the connector's concern
        Ok(Self::Usb(UsbConfig {
            vendor_id: fields.required_int("vendor_id")?,
            product_id: fields.required_int("product_id")?,
            in_endpoint: fields.required_int("in_endpoint")?,
            out_endpoint: fields.required_int("out_endpoint")?,
            interface: fields.optional_int("interface")?.unwrap_or(0),
            timeout: Duration::from_millis(positive(
                "timeout",
                fields
                    .optional_int::<u64>("timeout")?
                    .unwrap_or(DEFAULT_USB_TIMEOUT_MS),
            )?),
        }))
    }

    fn serial(fields: &Fields<'_>, options: &ValidationOptions) -> Result<Self, ConfigError> {
        let device = fields.required_str("device")?;

        let baud_rate = fields
            .optional_int::<u32>("baud_rate")?
            .unwrap_or(DEFAULT_BAUD_RATE);
        if !options.allowed_baud_rates.contains(&baud_rate) {
            return Err(ConfigError::invalid(
                "baud_rate",
                format!(
                    "{} is not one of {:?}",
                    baud_rate, options.allowed_baud_rates
                ),
            ));
        }

        let byte_size = fields.optional_int::<u8>("byte_size")?.unwrap_or(8);
        if !(5..=8).contains(&byte_size) {
            return Err(ConfigError::invalid(
                "byte_size",
                format!("{} is not between 5 and 8", byte_size),
            ));
        }

        let stop_bits = fields.optional_int::<u8>("stop_bits")?.unwrap_or(1);
        if !matches!(stop_bits, 1 | 2) {
            return Err(ConfigError::invalid(
                "stop_bits",
                format!("{} is not 1 or 2", stop_bits),
            ));
        }

        let parity = match fields.optional_str("parity")?.as_deref() {
            None | Some("N") | Some("n") => Parity::None,
            Some("E") | Some("e") => Parity::Even,
            Some("O") | Some("o") => Parity::Odd,
            Some(other) => {
                return Err(ConfigError::invalid(
                    "parity",
                    format!("`{}` is not one of N, E, O", other),
                ));
            }
        };

        Ok(Self::Serial(SerialConfig {
            device,
            baud_rate,
            byte_size,
            stop_bits,
            parity,
            timeout: fields.timeout_secs("timeout")?,
        }))
    }

    fn network(fields: &Fields<'_>) -> Result<Self, ConfigError> {
        let host = fields.required_str("host")?;

        let port = fields
            .optional_int::<u64>("port")?
            .unwrap_or(DEFAULT_NETWORK_PORT as u64);
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                ConfigError::invalid("port", format!("{} is not between 1 and 65535", port))
            })?;

        Ok(Self::Network(NetworkConfig {
            host,
            port,
            timeout: fields.timeout_secs("timeout")?,
        }))
    }

    /// Transport name as it appears in configuration
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Usb(_) => "usb",
            Self::Serial(_) => "serial",
            Self::Network(_) => "network",
        }
    }

    /// Identity of the physical device, used to serialise access to it
    pub fn device_key(&self) -> String {
        match self {
            Self::Usb(c) => format!("usb:{:04x}:{:04x}", c.vendor_id, c.product_id),
            Self::Serial(c) => format!("serial:{}", c.device),
            Self::Network(c) => format!("network:{}:{}", c.host.to_ascii_lowercase(), c.port),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            Self::Usb(c) => c.timeout,
            Self::Serial(c) => c.timeout,
            Self::Network(c) => c.timeout,
        }
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usb(c) => write!(f, "usb {:04x}:{:04x}", c.vendor_id, c.product_id),
            Self::Serial(c) => write!(f, "serial {} @{}", c.device, c.baud_rate),
            Self::Network(c) => write!(f, "network {}:{}", c.host, c.port),
        }
    }
}

fn positive(field: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be greater than 0"));
    }
    Ok(value)
}

/// Typed accessors over the loose field map
struct Fields<'a>(&'a Map<String, Value>);

impl Fields<'_> {
    fn get(&self, field: &'static str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    fn required_str(&self, field: &'static str) -> Result<String, ConfigError> {
        self.optional_str(field)?
            .ok_or(ConfigError::MissingField { field })
    }

    /// Non-empty string; blank counts as missing
    fn optional_str(&self, field: &'static str) -> Result<Option<String>, ConfigError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => {
                Err(ConfigError::MissingField { field })
            }
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(other) => Err(ConfigError::invalid(
                field,
                format!("expected a string, got {}", other),
            )),
        }
    }

    fn required_int<T: TryFrom<u64>>(&self, field: &'static str) -> Result<T, ConfigError> {
        self.optional_int(field)?
            .ok_or(ConfigError::MissingField { field })
    }

    /// Unsigned integer given as a JSON number, a decimal string, or a `0x` hex string
    fn optional_int<T: TryFrom<u64>>(&self, field: &'static str) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.get(field) else {
            return Ok(None);
        };

        let n = match value {
            Value::Number(n) => n.as_u64().ok_or_else(|| {
                ConfigError::invalid(field, format!("{} is not a non-negative integer", n))
            })?,
            Value::String(s) => parse_uint(s.trim())
                .ok_or_else(|| ConfigError::invalid(field, format!("`{}` is not an integer", s)))?,
            other => {
                return Err(ConfigError::invalid(
                    field,
                    format!("expected an integer, got {}", other),
                ));
            }
        };

        T::try_from(n)
            .map(Some)
            .map_err(|_| ConfigError::invalid(field, format!("{} is out of range", n)))
    }

    /// Positive number of seconds (fractions allowed)
    fn timeout_secs(&self, field: &'static str) -> Result<Duration, ConfigError> {
        let secs = match self.get(field) {
            None => DEFAULT_TIMEOUT_SECS,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(f64::NAN),
            Some(other) => {
                return Err(ConfigError::invalid(
                    field,
                    format!("expected seconds, got {}", other),
                ));
            }
        };

        if !secs.is_finite() || secs <= 0.0 {
            return Err(ConfigError::invalid(field, "must be a positive number of seconds"));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|_| ConfigError::invalid(field, format!("{} seconds is too large", secs)))
    }
}

fn parse_uint(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(raw: RawProfile) -> Result<TransportConfig, ConfigError> {
        TransportConfig::from_raw(&raw, &ValidationOptions::default())
    }

    fn usb() -> RawProfile {
        RawProfile::new("usb")
            .field("vendor_id", "0x04b8")
            .field("product_id", "0x0202")
            .field("in_endpoint", 0x82)
            .field("out_endpoint", 0x01)
    }

    #[test]
    fn test_usb_hex_ids_and_defaults() {
        let TransportConfig::Usb(c) = validate(usb()).unwrap() else {
            panic!("expected usb");
        };
        assert_eq!(c.vendor_id, 0x04b8);
        assert_eq!(c.product_id, 0x0202);
        assert_eq!(c.in_endpoint, 0x82);
        assert_eq!(c.out_endpoint, 0x01);
        assert_eq!(c.interface, 0);
        assert_eq!(c.timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_usb_missing_endpoint() {
        let mut raw = usb();
        raw.fields.remove("out_endpoint");
        assert_eq!(
            validate(raw).unwrap_err(),
            ConfigError::MissingField { field: "out_endpoint" }
        );
    }

    #[test]
    fn test_usb_rejects_negative_and_oversized_ids() {
        let err = validate(usb().field("vendor_id", -1)).unwrap_err();
        assert_eq!(err.field(), Some("vendor_id"));

        let err = validate(usb().field("product_id", 70000)).unwrap_err();
        assert_eq!(err.field(), Some("product_id"));

        let err = validate(usb().field("vendor_id", "epson")).unwrap_err();
        assert_eq!(err.field(), Some("vendor_id"));
    }

    #[test]
    fn test_usb_direction_not_checked() {
        // swapped endpoints are accepted here; the connector finds out
        let raw = usb().field("in_endpoint", 0x01).field("out_endpoint", 0x82);
        assert!(validate(raw).is_ok());
    }

    #[test]
    fn test_serial_defaults() {
        let raw = RawProfile::new("serial").field("device", "/dev/ttyUSB0");
        let TransportConfig::Serial(c) = validate(raw).unwrap() else {
            panic!("expected serial");
        };
        assert_eq!(c.device, "/dev/ttyUSB0");
        assert_eq!(c.baud_rate, 9600);
        assert_eq!(c.byte_size, 8);
        assert_eq!(c.stop_bits, 1);
        assert_eq!(c.parity, Parity::None);
    }

    #[test]
    fn test_serial_rules() {
        let base = || RawProfile::new("serial").field("device", "COM3");

        let err = validate(RawProfile::new("serial").field("device", "  ")).unwrap_err();
        assert_eq!(err, ConfigError::MissingField { field: "device" });

        let err = validate(base().field("baud_rate", 12345)).unwrap_err();
        assert_eq!(err.field(), Some("baud_rate"));

        let err = validate(base().field("baud_rate", 0)).unwrap_err();
        assert_eq!(err.field(), Some("baud_rate"));

        let err = validate(base().field("parity", "X")).unwrap_err();
        assert_eq!(err.field(), Some("parity"));

        let err = validate(base().field("stop_bits", 3)).unwrap_err();
        assert_eq!(err.field(), Some("stop_bits"));

        let profile = base().field("parity", "E").field("baud_rate", "19200");
        let TransportConfig::Serial(c) = validate(profile).unwrap() else {
            panic!("expected serial");
        };
        assert_eq!(c.parity, Parity::Even);
        assert_eq!(c.baud_rate, 19200);
    }

    #[test]
    fn test_serial_custom_allow_list() {
        let options = ValidationOptions {
            allowed_baud_rates: vec![4800],
        };
        let raw = RawProfile::new("serial")
            .field("device", "COM1")
            .field("baud_rate", 4800);
        assert!(TransportConfig::from_raw(&raw, &options).is_ok());
    }

    #[test]
    fn test_network_rules() {
        let TransportConfig::Network(c) =
            validate(RawProfile::new("network").field("host", "10.0.0.9")).unwrap()
        else {
            panic!("expected network");
        };
        assert_eq!(c.port, 9100);
        assert_eq!(c.timeout, Duration::from_secs(5));

        let err = validate(RawProfile::new("network")).unwrap_err();
        assert_eq!(err, ConfigError::MissingField { field: "host" });

        for port in [0, 65536] {
            let raw = RawProfile::new("network")
                .field("host", "10.0.0.9")
                .field("port", port);
            assert_eq!(validate(raw).unwrap_err().field(), Some("port"));
        }

        for timeout in [0.0, -1.0] {
            let raw = RawProfile::new("network")
                .field("host", "10.0.0.9")
                .field("timeout", timeout);
            assert_eq!(validate(raw).unwrap_err().field(), Some("timeout"));
        }
    }

    #[test]
    fn test_huge_timeout_rejected() {
        let raw = RawProfile::new("network")
            .field("host", "10.0.0.9")
            .field("timeout", 1e30);
        assert_eq!(validate(raw).unwrap_err().field(), Some("timeout"));

        let raw = RawProfile::new("serial")
            .field("device", "/dev/ttyUSB0")
            .field("timeout", "1e30");
        assert_eq!(validate(raw).unwrap_err().field(), Some("timeout"));
    }

    #[test]
    fn test_unknown_device_type() {
        let err = validate(RawProfile::new("bluetooth")).unwrap_err();
        assert_eq!(err, ConfigError::UnknownDeviceType("bluetooth".to_string()));
    }

    #[test]
    fn test_device_key() {
        let c = validate(usb()).unwrap();
        assert_eq!(c.device_key(), "usb:04b8:0202");

        let c = validate(RawProfile::new("network").field("host", "Printer.LAN")).unwrap();
        assert_eq!(c.device_key(), "network:printer.lan:9100");
    }
}
