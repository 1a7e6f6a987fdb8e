//! Serial printer (RS-232 or USB virtual COM port)
//!
//! serialport is blocking, so every call runs on the blocking pool.

use std::io::Write;

use async_trait::async_trait;
use serialport::SerialPort;
use tracing::{info, instrument, warn};

use super::{OpenTask, PrinterConnector, open_blocking, reap_orphan};
use crate::config::{Parity, SerialConfig};
use crate::error::{TransportError, TransportResult};

pub struct SerialConnector {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
    /// Open that outlived its timeout; released on close
    late_open: Option<OpenTask<Box<dyn SerialPort>>>,
}

impl SerialConnector {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: None,
            late_open: None,
        }
    }
}

#[async_trait]
impl PrinterConnector for SerialConnector {
    #[instrument(skip(self), fields(device = %self.config.device, baud = self.config.baud_rate))]
    async fn open(&mut self) -> TransportResult<()> {
        if self.port.is_some() {
            return Ok(());
        }

        let config = self.config.clone();
        let label = format!("open {}", config.device);
        let port = open_blocking(self.config.timeout, &label, &mut self.late_open, move || {
            open_port(&config)
        })
        .await?;

        info!("Serial port opened");
        self.port = Some(port);
        Ok(())
    }

    #[instrument(skip(self, data), fields(device = %self.config.device, data_len = data.len()))]
    async fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        let mut port = self
            .port
            .take()
            .ok_or_else(|| TransportError::io_failure("serial port is not open"))?;
        let data = data.to_vec();

        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = port.write_all(&data).and_then(|_| port.flush());
            (port, result)
        })
        .await
        .map_err(|e| TransportError::io_failure(format!("write task failed: {}", e)))?;

        self.port = Some(port);
        result.map_err(|e| {
            warn!(error = %e, "Serial write failed");
            TransportError::io_failure(format!("write failed: {}", e))
        })?;

        info!("Print data sent");
        Ok(())
    }

    async fn close(&mut self) {
        reap_orphan(&mut self.late_open, self.config.timeout).await;
        // Dropping the handle closes the port
        drop(self.port.take());
    }
}

fn open_port(config: &SerialConfig) -> TransportResult<Box<dyn SerialPort>> {
    let data_bits = match config.byte_size {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        _ => serialport::DataBits::Eight,
    };
    let stop_bits = match config.stop_bits {
        2 => serialport::StopBits::Two,
        _ => serialport::StopBits::One,
    };
    let parity = match config.parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    };

    serialport::new(&config.device, config.baud_rate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity)
        .timeout(config.timeout)
        .open()
        .map_err(|e| classify_open_error(&e, &config.device))
}

fn classify_open_error(err: &serialport::Error, device: &str) -> TransportError {
    use serialport::ErrorKind;

    match err.kind() {
        ErrorKind::Io(kind) => TransportError::from_open_io(&std::io::Error::from(kind), device),
        _ => TransportError::not_found(format!("{}: {}", device, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use std::time::Duration;

    fn config(device: &str) -> SerialConfig {
        SerialConfig {
            device: device.to_string(),
            baud_rate: 9600,
            byte_size: 8,
            stop_bits: 1,
            parity: Parity::None,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_classify_permission_denied() {
        let err = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "denied",
        );
        let e = classify_open_error(&err, "/dev/ttyS0");
        assert_eq!(e.kind, TransportErrorKind::PermissionDenied);
    }

    #[test]
    fn test_classify_no_device() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        let e = classify_open_error(&err, "/dev/ttyS0");
        assert_eq!(e.kind, TransportErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_missing_device_is_not_found() {
        let mut connector = SerialConnector::new(config("/dev/till-printer-does-not-exist"));
        let err = connector.open().await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::NotFound);
        connector.close().await;
    }

    #[tokio::test]
    async fn test_send_before_open_fails() {
        let mut connector = SerialConnector::new(config("COM9"));
        let err = connector.send(b"x").await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::IoFailure);
    }
}
