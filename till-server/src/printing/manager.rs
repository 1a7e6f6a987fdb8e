//! Receipt print orchestration
//!
//! `print_receipt` formats the sale, opens the first reachable printer in
//! the profile's fallback chain, sends the receipt (retrying once on the
//! same printer after a transmission failure) and closes the connection on
//! every path. Failures come back as a [`PrintResult`], never as an error.

use std::sync::Arc;

use dashmap::DashMap;
use shared::SaleRecord;
use till_printer::{
    ConnectorFactory, HardwareConnectors, PrinterConnector, TransportError, TransportErrorKind,
    encode,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use super::events::{PrintEventSink, TracingEventSink};
use super::formatter::ReceiptFormatter;
use super::registry::{PrinterProfile, ProfileRegistry};
use super::types::{PrintErrorKind, PrintEvent, PrintResult};

/// Printer manager
///
/// Holds a per-device lock for each physical printer, so receipts going to
/// the same device never interleave on the wire while different devices
/// print in parallel.
pub struct PrinterManager<F: ConnectorFactory = HardwareConnectors> {
    registry: Arc<ProfileRegistry>,
    formatter: ReceiptFormatter,
    factory: F,
    sink: Arc<dyn PrintEventSink>,
    device_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PrinterManager<HardwareConnectors> {
    /// Manager talking to real hardware
    pub fn new(registry: Arc<ProfileRegistry>, formatter: ReceiptFormatter) -> Self {
        Self::with_factory(registry, formatter, HardwareConnectors)
    }
}

impl<F: ConnectorFactory> PrinterManager<F> {
    pub fn with_factory(
        registry: Arc<ProfileRegistry>,
        formatter: ReceiptFormatter,
        factory: F,
    ) -> Self {
        Self {
            registry,
            formatter,
            factory,
            sink: Arc::new(TracingEventSink),
            device_locks: DashMap::new(),
        }
    }

    /// Replace the default tracing event sink
    pub fn with_event_sink(mut self, sink: Arc<dyn PrintEventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn formatter(&self) -> &ReceiptFormatter {
        &self.formatter
    }

    /// Print one receipt
    ///
    /// Not deduplicated: calling twice for the same sale prints twice.
    pub async fn print_receipt(&self, sale: &SaleRecord, profile: &str) -> PrintResult {
        self.print_receipt_unless(sale, profile, &|| false).await
    }

    /// Print one receipt unless `abandoned` reports true by the time the
    /// device lock is acquired
    ///
    /// The check happens before any hardware I/O; once `open()` has started
    /// the call runs to completion.
    #[instrument(skip(self, sale, abandoned), fields(order_id = %sale.order_id))]
    pub async fn print_receipt_unless(
        &self,
        sale: &SaleRecord,
        profile: &str,
        abandoned: &(dyn Fn() -> bool + Sync),
    ) -> PrintResult {
        let commands = match self.formatter.format(sale) {
            Ok(commands) => commands,
            Err(e) => {
                let message = format!("cannot format sale {}: {}", sale.order_id, e);
                self.report(PrintEvent::new(profile, PrintErrorKind::FormatError, &message));
                return PrintResult::failed(PrintErrorKind::FormatError, message)
                    .on_profile(profile);
            }
        };
        let data = encode(&commands);

        let chain = self.registry.chain(profile);
        if chain.is_empty() {
            let message = format!("unknown printer profile `{}`", profile);
            self.report(PrintEvent::new(profile, PrintErrorKind::ConnectionFailed, &message));
            return PrintResult::failed(PrintErrorKind::ConnectionFailed, message)
                .on_profile(profile);
        }

        let mut last_failure: Option<(&str, TransportError)> = None;

        for candidate in chain {
            match self.connect(candidate, abandoned).await {
                Ok(Some(session)) => return self.transmit(session, &data).await,
                Ok(None) => {
                    debug!(profile = %candidate.name, "Print abandoned before dispatch");
                    return PrintResult::failed(
                        PrintErrorKind::ConnectionFailed,
                        "print abandoned before dispatch",
                    )
                    .on_profile(&candidate.name);
                }
                Err(e) => {
                    self.report(
                        PrintEvent::new(
                            &candidate.name,
                            PrintErrorKind::ConnectionFailed,
                            e.to_string(),
                        )
                        .with_transport_error(e.kind),
                    );
                    let fall_back = e.kind.is_connect_failure() && candidate.fallback.is_some();
                    if fall_back {
                        warn!(
                            profile = %candidate.name,
                            fallback = ?candidate.fallback,
                            error = %e,
                            "Printer unavailable, trying fallback"
                        );
                    }
                    last_failure = Some((candidate.name.as_str(), e));
                    if !fall_back {
                        break;
                    }
                }
            }
        }

        let (last_profile, message) = match last_failure {
            Some((name, e)) => (name, format!("cannot reach printer `{}`: {}", name, e)),
            None => (profile, format!("no printer available for `{}`", profile)),
        };
        PrintResult::failed(PrintErrorKind::ConnectionFailed, message).on_profile(last_profile)
    }

    /// Lock the profile's device, then open a connector to it
    ///
    /// `None` when the caller abandoned the job while waiting for the lock.
    /// On failure the connector is closed and the lock released before
    /// returning.
    async fn connect<'a>(
        &self,
        profile: &'a PrinterProfile,
        abandoned: &(dyn Fn() -> bool + Sync),
    ) -> Result<Option<Session<'a, F::Connector>>, TransportError> {
        let guard = self.device_lock(profile).lock_owned().await;
        if abandoned() {
            return Ok(None);
        }
        let mut connector = self.factory.connector(&profile.transport);

        debug!(profile = %profile.name, transport = %profile.transport, "Opening printer");
        match connector.open().await {
            Ok(()) => Ok(Some(Session {
                profile,
                connector,
                _guard: guard,
            })),
            Err(e) => {
                connector.close().await;
                Err(e)
            }
        }
    }

    async fn transmit(&self, mut session: Session<'_, F::Connector>, data: &[u8]) -> PrintResult {
        let profile = session.profile;

        let outcome = match session.connector.send(data).await {
            Err(e) if e.kind == TransportErrorKind::IoFailure => {
                self.report(
                    PrintEvent::new(
                        &profile.name,
                        PrintErrorKind::TransmissionFailed,
                        e.to_string(),
                    )
                    .with_transport_error(e.kind),
                );
                warn!(
                    profile = %profile.name,
                    error = %e,
                    "Send failed, retrying once on a fresh connection"
                );
                self.retry(&mut session, data).await
            }
            other => other,
        };

        session.close().await;

        match outcome {
            Ok(()) => {
                info!(profile = %profile.name, bytes = data.len(), "Receipt printed");
                PrintResult::printed(&profile.name)
            }
            Err(e) => {
                self.report(
                    PrintEvent::new(
                        &profile.name,
                        PrintErrorKind::TransmissionFailed,
                        e.to_string(),
                    )
                    .with_transport_error(e.kind),
                );
                PrintResult::failed(
                    PrintErrorKind::TransmissionFailed,
                    format!("cannot send receipt to `{}`: {}", profile.name, e),
                )
                .on_profile(&profile.name)
            }
        }
    }

    /// Replace the session's connector with a freshly opened one to the
    /// same profile and send again. The device lock stays held throughout.
    async fn retry(
        &self,
        session: &mut Session<'_, F::Connector>,
        data: &[u8],
    ) -> Result<(), TransportError> {
        session.connector.close().await;
        session.connector = self.factory.connector(&session.profile.transport);
        session.connector.open().await?;
        session.connector.send(data).await
    }

    fn device_lock(&self, profile: &PrinterProfile) -> Arc<Mutex<()>> {
        self.device_locks
            .entry(profile.transport.device_key())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    fn report(&self, event: PrintEvent) {
        self.sink.record(&event);
    }
}

/// An open connector plus the lock on its device
struct Session<'a, C: PrinterConnector> {
    profile: &'a PrinterProfile,
    connector: C,
    _guard: OwnedMutexGuard<()>,
}

impl<C: PrinterConnector> Session<'_, C> {
    /// Close the connector, then release the device
    async fn close(mut self) {
        self.connector.close().await;
    }
}
