//! Network printer (raw TCP, usually port 9100)

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use super::PrinterConnector;
use crate::config::NetworkConfig;
use crate::error::{TransportError, TransportResult};

/// Network printer connector
///
/// Most thermal printers accept raw ESC/POS on TCP port 9100.
#[derive(Debug)]
pub struct NetworkConnector {
    config: NetworkConfig,
    stream: Option<TcpStream>,
}

impl NetworkConnector {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}

#[async_trait]
impl PrinterConnector for NetworkConnector {
    #[instrument(skip(self), fields(addr = %self.addr()))]
    async fn open(&mut self) -> TransportResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = self.addr();
        let connect = TcpStream::connect((self.config.host.as_str(), self.config.port));
        let stream = tokio::time::timeout(self.config.timeout, connect)
            .await
            .map_err(|_| TransportError::timeout(format!("connection timeout: {}", addr)))?
            .map_err(|e| TransportError::from_open_io(&e, &addr))?;

        // Receipts are small; don't hold the last segment back
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "set_nodelay failed");
        }

        info!("Connected to printer");
        self.stream = Some(stream);
        Ok(())
    }

    #[instrument(skip(self, data), fields(addr = %self.addr(), data_len = data.len()))]
    async fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        let timeout = self.config.timeout;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::io_failure("connection is not open"))?;

        let write = async {
            stream.write_all(data).await?;
            stream.flush().await
        };

        match tokio::time::timeout(timeout, write).await {
            Ok(Ok(())) => {
                info!("Print data sent");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Write failed");
                Err(TransportError::io_failure(format!("write failed: {}", e)))
            }
            Err(_) => {
                warn!("Write timed out");
                Err(TransportError::io_failure("write timed out"))
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "shutdown failed");
            }
        }
    }
}
