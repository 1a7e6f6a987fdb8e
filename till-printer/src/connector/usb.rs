//! USB printer (printer-class device, bulk OUT endpoint)
//!
//! nusb calls are blocking (`MaybeFuture::wait`), so they run on the
//! blocking pool like the serial connector.

use std::io::Write;

use async_trait::async_trait;
use nusb::MaybeFuture;
use nusb::io::EndpointWrite;
use nusb::transfer::{Bulk, Out};
use tracing::{info, instrument, warn};

use super::{OpenTask, PrinterConnector, open_blocking, reap_orphan};
use crate::config::UsbConfig;
use crate::error::{TransportError, TransportResult};

/// Bytes buffered per bulk transfer
const WRITE_BUFFER_SIZE: usize = 4096;

/// High bit of an endpoint address marks the IN direction
const ENDPOINT_DIR_IN: u8 = 0x80;

pub struct UsbConnector {
    config: UsbConfig,
    writer: Option<EndpointWrite<Bulk>>,
    /// Claim that outlived its timeout; released on close
    late_open: Option<OpenTask<EndpointWrite<Bulk>>>,
}

impl UsbConnector {
    pub fn new(config: UsbConfig) -> Self {
        Self {
            config,
            writer: None,
            late_open: None,
        }
    }

    fn id(&self) -> String {
        format!("{:04x}:{:04x}", self.config.vendor_id, self.config.product_id)
    }
}

#[async_trait]
impl PrinterConnector for UsbConnector {
    #[instrument(skip(self), fields(usb = %self.id(), interface = self.config.interface))]
    async fn open(&mut self) -> TransportResult<()> {
        if self.writer.is_some() {
            return Ok(());
        }

        let config = self.config.clone();
        let label = format!("USB open {}", self.id());
        let writer = open_blocking(self.config.timeout, &label, &mut self.late_open, move || {
            claim(&config)
        })
        .await?;

        info!("USB interface claimed");
        self.writer = Some(writer);
        Ok(())
    }

    #[instrument(skip(self, data), fields(usb = %self.id(), data_len = data.len()))]
    async fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| TransportError::io_failure("USB device is not open"))?;
        let data = data.to_vec();

        let (writer, result) = tokio::task::spawn_blocking(move || {
            let result = writer.write_all(&data).and_then(|_| writer.flush());
            (writer, result)
        })
        .await
        .map_err(|e| TransportError::io_failure(format!("write task failed: {}", e)))?;

        self.writer = Some(writer);
        result.map_err(|e| {
            warn!(error = %e, "USB write failed");
            TransportError::io_failure(format!("write failed: {}", e))
        })?;

        info!("Print data sent");
        Ok(())
    }

    async fn close(&mut self) {
        reap_orphan(&mut self.late_open, self.config.timeout).await;
        // Dropping the writer releases the claimed interface
        drop(self.writer.take());
    }
}

/// Find the device, claim its interface and open the OUT endpoint
fn claim(config: &UsbConfig) -> TransportResult<EndpointWrite<Bulk>> {
    let id = format!("{:04x}:{:04x}", config.vendor_id, config.product_id);

    if config.out_endpoint & ENDPOINT_DIR_IN != 0 {
        return Err(TransportError::not_found(format!(
            "{}: endpoint 0x{:02x} is an IN endpoint",
            id, config.out_endpoint
        )));
    }

    let info = nusb::list_devices()
        .wait()
        .map_err(|e| classify_usb_error(&e, &id))?
        .find(|d| d.vendor_id() == config.vendor_id && d.product_id() == config.product_id)
        .ok_or_else(|| TransportError::not_found(format!("USB device {} not connected", id)))?;

    let device = info.open().wait().map_err(|e| classify_usb_error(&e, &id))?;

    // The kernel printer driver (usblp) usually holds the interface
    let interface = device
        .detach_and_claim_interface(config.interface)
        .wait()
        .map_err(|e| classify_usb_error(&e, &id))?;

    let endpoint = interface
        .endpoint::<Bulk, Out>(config.out_endpoint)
        .map_err(|e| classify_usb_error(&e, &id))?;

    Ok(endpoint
        .writer(WRITE_BUFFER_SIZE)
        .with_write_timeout(config.timeout))
}

fn classify_usb_error(err: &nusb::Error, id: &str) -> TransportError {
    use nusb::ErrorKind;

    let message = format!("{}: {}", id, err);
    match err.kind() {
        ErrorKind::PermissionDenied => TransportError::permission_denied(message),
        _ => TransportError::not_found(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use std::time::Duration;

    fn config() -> UsbConfig {
        UsbConfig {
            vendor_id: 0x04b8,
            product_id: 0x0202,
            in_endpoint: 0x82,
            out_endpoint: 0x01,
            interface: 0,
            timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_in_endpoint_rejected_for_writing() {
        let mut c = config();
        c.out_endpoint = 0x82;
        let err = claim(&c).err().unwrap();
        assert_eq!(err.kind, TransportErrorKind::NotFound);
        assert!(err.message.contains("IN endpoint"));
    }

    #[tokio::test]
    async fn test_send_before_open_fails() {
        let mut connector = UsbConnector::new(config());
        let err = connector.send(b"x").await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::IoFailure);
        connector.close().await;
        connector.close().await;
    }
}
