//! Printer connectors
//!
//! One connector per transport, all behind [`PrinterConnector`]:
//! - USB printers (bulk OUT endpoint, via nusb)
//! - Serial printers (via serialport)
//! - Network printers (raw TCP, port 9100)
//!
//! Constructing a connector never touches hardware; `open()` does. Neither
//! `open()` nor `send()` retries: retry policy belongs to the caller.

mod network;
mod serial;
mod usb;

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};

pub use network::NetworkConnector;
pub use serial::SerialConnector;
pub use usb::UsbConnector;

/// A connection to one physical printer
#[async_trait]
pub trait PrinterConnector: Send {
    /// Perform the transport handshake within the configured timeout
    ///
    /// Fails with `NotFound`, `PermissionDenied` or `Timeout`.
    async fn open(&mut self) -> TransportResult<()>;

    /// Write the whole buffer or fail with `IoFailure`
    ///
    /// A failure after some bytes left the host is still a failure.
    async fn send(&mut self, data: &[u8]) -> TransportResult<()>;

    /// Release the connection; idempotent and infallible
    ///
    /// Blocking transports also wait (within their timeout) for an open that
    /// timed out, so the device is free once `close` returns.
    async fn close(&mut self);
}

/// Builds connectors for a transport configuration
///
/// The service layer is generic over this so tests can substitute scripted
/// connectors for real hardware.
pub trait ConnectorFactory: Send + Sync + 'static {
    type Connector: PrinterConnector + 'static;

    fn connector(&self, config: &TransportConfig) -> Self::Connector;
}

/// Connector over the configured transport
pub enum Connector {
    Usb(UsbConnector),
    Serial(SerialConnector),
    Network(NetworkConnector),
}

impl Connector {
    pub fn new(config: &TransportConfig) -> Self {
        match config {
            TransportConfig::Usb(c) => Self::Usb(UsbConnector::new(c.clone())),
            TransportConfig::Serial(c) => Self::Serial(SerialConnector::new(c.clone())),
            TransportConfig::Network(c) => Self::Network(NetworkConnector::new(c.clone())),
        }
    }
}

#[async_trait]
impl PrinterConnector for Connector {
    async fn open(&mut self) -> TransportResult<()> {
        match self {
            Self::Usb(c) => c.open().await,
            Self::Serial(c) => c.open().await,
            Self::Network(c) => c.open().await,
        }
    }

    async fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        match self {
            Self::Usb(c) => c.send(data).await,
            Self::Serial(c) => c.send(data).await,
            Self::Network(c) => c.send(data).await,
        }
    }

    async fn close(&mut self) {
        match self {
            Self::Usb(c) => c.close().await,
            Self::Serial(c) => c.close().await,
            Self::Network(c) => c.close().await,
        }
    }
}

/// Factory for real hardware connectors
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareConnectors;

impl ConnectorFactory for HardwareConnectors {
    type Connector = Connector;

    fn connector(&self, config: &TransportConfig) -> Connector {
        Connector::new(config)
    }
}

/// A blocking open running on the blocking pool
type OpenTask<T> = JoinHandle<TransportResult<T>>;

/// Run a blocking open under `timeout`
///
/// A timed-out task cannot be cancelled and may still claim the device, so
/// it is parked in `orphan` for [`reap_orphan`] to release on `close()`.
async fn open_blocking<T, F>(
    timeout: Duration,
    label: &str,
    orphan: &mut Option<OpenTask<T>>,
    open: F,
) -> TransportResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> TransportResult<T> + Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(open);
    match tokio::time::timeout(timeout, &mut task).await {
        Ok(joined) => joined
            .map_err(|e| TransportError::not_found(format!("{} task failed: {}", label, e)))?,
        Err(_) => {
            *orphan = Some(task);
            Err(TransportError::timeout(format!("{} timed out", label)))
        }
    }
}

/// Wait up to `timeout` for a timed-out open and drop whatever it opened
async fn reap_orphan<T>(orphan: &mut Option<OpenTask<T>>, timeout: Duration) {
    let Some(task) = orphan.take() else {
        return;
    };
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(handle))) => {
            debug!("Releasing device opened after its timeout");
            drop(handle);
        }
        Ok(_) => {}
        Err(_) => warn!("Timed-out open is still running; the device may stay claimed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Stands in for a port handle; records when it is released
    #[derive(Debug)]
    struct Handle(Arc<AtomicBool>);

    impl Drop for Handle {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_open_blocking_success() {
        let mut orphan = None;
        let value = open_blocking(Duration::from_secs(1), "open", &mut orphan, || Ok(7))
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert!(orphan.is_none());
    }

    #[tokio::test]
    async fn test_late_open_is_released_on_reap() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();
        let mut orphan = None;

        let err = open_blocking(Duration::from_millis(20), "slow open", &mut orphan, move || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(Handle(flag))
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind, TransportErrorKind::Timeout);
        assert!(orphan.is_some());
        assert!(!released.load(Ordering::SeqCst));

        reap_orphan(&mut orphan, Duration::from_secs(2)).await;
        assert!(orphan.is_none());
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_reap_without_orphan_is_noop() {
        let mut orphan: Option<OpenTask<()>> = None;
        reap_orphan(&mut orphan, Duration::from_millis(10)).await;
    }
}
