//! Scripted printer connectors for driving `PrinterManager` without hardware

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{LineItem, ProfileDocument, RawProfile, SaleRecord};
use till_printer::{
    ConnectorFactory, PrinterConnector, TransportConfig, TransportError, TransportErrorKind,
    TransportResult, ValidationOptions,
};
use till_server::{PrinterManager, ProfileRegistry, ReceiptFormatter};
use till_server::printing::MemoryEventSink;

pub const FRONT_USB_KEY: &str = "usb:04b8:0202";

/// Scripted outcome of one `open()` or `send()` call; unscripted calls succeed
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Ok,
    Fail(TransportErrorKind),
}

#[derive(Default)]
struct Script {
    opens: VecDeque<Step>,
    sends: VecDeque<Step>,
}

/// Calls made on one connector instance
#[derive(Debug)]
pub struct ConnectorLog {
    pub device_key: String,
    pub opens: AtomicUsize,
    pub sends: AtomicUsize,
    pub closes: AtomicUsize,
    pub bytes: Mutex<Vec<u8>>,
}

impl ConnectorLog {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Inner {
    scripts: Mutex<HashMap<String, Script>>,
    connectors: Mutex<Vec<Arc<ConnectorLog>>>,
    send_delay: Mutex<Duration>,
    sending: Mutex<HashMap<String, usize>>,
    max_per_device: Mutex<HashMap<String, usize>>,
    max_total: AtomicUsize,
}

/// Connector factory whose connectors follow per-device scripts
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    inner: Arc<Inner>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_open(&self, device_key: &str, steps: impl IntoIterator<Item = Step>) -> &Self {
        let mut scripts = self.inner.scripts.lock().unwrap();
        scripts
            .entry(device_key.to_string())
            .or_default()
            .opens
            .extend(steps);
        self
    }

    pub fn script_send(&self, device_key: &str, steps: impl IntoIterator<Item = Step>) -> &Self {
        let mut scripts = self.inner.scripts.lock().unwrap();
        scripts
            .entry(device_key.to_string())
            .or_default()
            .sends
            .extend(steps);
        self
    }

    /// Every `send()` sleeps this long before completing
    pub fn set_send_delay(&self, delay: Duration) {
        *self.inner.send_delay.lock().unwrap() = delay;
    }

    pub fn connectors(&self) -> Vec<Arc<ConnectorLog>> {
        self.inner.connectors.lock().unwrap().clone()
    }

    pub fn connectors_for(&self, device_key: &str) -> Vec<Arc<ConnectorLog>> {
        self.connectors()
            .into_iter()
            .filter(|c| c.device_key == device_key)
            .collect()
    }

    pub fn total_sends(&self) -> usize {
        self.connectors().iter().map(|c| c.sends()).sum()
    }

    /// Highest number of overlapping sends seen on one device
    pub fn max_concurrent(&self, device_key: &str) -> usize {
        self.inner
            .max_per_device
            .lock()
            .unwrap()
            .get(device_key)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of overlapping sends seen across all devices
    pub fn max_concurrent_total(&self) -> usize {
        self.inner.max_total.load(Ordering::SeqCst)
    }

    fn next_open(&self, device_key: &str) -> Step {
        self.inner
            .scripts
            .lock()
            .unwrap()
            .get_mut(device_key)
            .and_then(|s| s.opens.pop_front())
            .unwrap_or(Step::Ok)
    }

    fn next_send(&self, device_key: &str) -> Step {
        self.inner
            .scripts
            .lock()
            .unwrap()
            .get_mut(device_key)
            .and_then(|s| s.sends.pop_front())
            .unwrap_or(Step::Ok)
    }

    fn begin_send(&self, device_key: &str) {
        let mut sending = self.inner.sending.lock().unwrap();
        let count = sending.entry(device_key.to_string()).or_insert(0);
        *count += 1;
        let device_count = *count;
        let total: usize = sending.values().sum();
        drop(sending);

        let mut max = self.inner.max_per_device.lock().unwrap();
        let entry = max.entry(device_key.to_string()).or_insert(0);
        *entry = (*entry).max(device_count);
        self.inner.max_total.fetch_max(total, Ordering::SeqCst);
    }

    fn end_send(&self, device_key: &str) {
        let mut sending = self.inner.sending.lock().unwrap();
        if let Some(count) = sending.get_mut(device_key) {
            *count -= 1;
        }
    }
}

impl ConnectorFactory for ScriptedFactory {
    type Connector = MockConnector;

    fn connector(&self, config: &TransportConfig) -> MockConnector {
        let log = Arc::new(ConnectorLog {
            device_key: config.device_key(),
            opens: AtomicUsize::new(0),
            sends: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            bytes: Mutex::new(Vec::new()),
        });
        self.inner.connectors.lock().unwrap().push(log.clone());
        MockConnector {
            factory: self.clone(),
            log,
        }
    }
}

pub struct MockConnector {
    factory: ScriptedFactory,
    log: Arc<ConnectorLog>,
}

fn outcome(step: Step) -> TransportResult<()> {
    match step {
        Step::Ok => Ok(()),
        Step::Fail(kind) => Err(TransportError::new(kind, "scripted failure")),
    }
}

#[async_trait]
impl PrinterConnector for MockConnector {
    async fn open(&mut self) -> TransportResult<()> {
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        outcome(self.factory.next_open(&self.log.device_key))
    }

    async fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        self.log.sends.fetch_add(1, Ordering::SeqCst);
        let key = self.log.device_key.clone();

        self.factory.begin_send(&key);
        let delay = *self.factory.inner.send_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.factory.end_send(&key);

        let result = outcome(self.factory.next_send(&key));
        if result.is_ok() {
            self.log.bytes.lock().unwrap().extend_from_slice(data);
        }
        result
    }

    async fn close(&mut self) {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn front_usb() -> RawProfile {
    RawProfile::new("usb")
        .field("vendor_id", "0x04b8")
        .field("product_id", "0x0202")
        .field("in_endpoint", 0x82)
        .field("out_endpoint", 0x01)
}

pub fn network(host: &str) -> RawProfile {
    RawProfile::new("network").field("host", host)
}

pub fn network_key(host: &str) -> String {
    format!("network:{}:9100", host)
}

pub fn registry(entries: Vec<(&str, RawProfile)>) -> Arc<ProfileRegistry> {
    let mut document = ProfileDocument::default();
    for (name, raw) in entries {
        document.insert(name, raw);
    }
    Arc::new(ProfileRegistry::from_document(&document, &ValidationOptions::default()).unwrap())
}

pub fn manager(
    registry: Arc<ProfileRegistry>,
    factory: &ScriptedFactory,
) -> (PrinterManager<ScriptedFactory>, Arc<MemoryEventSink>) {
    let sink = Arc::new(MemoryEventSink::new());
    let manager = PrinterManager::with_factory(
        registry,
        ReceiptFormatter::new("Corner Cafe"),
        factory.clone(),
    )
    .with_event_sink(sink.clone());
    (manager, sink)
}

pub fn coffee_sale() -> SaleRecord {
    SaleRecord {
        order_id: "1042".to_string(),
        timestamp: NaiveDate::from_ymd_opt(2024, 1, 22)
            .unwrap()
            .and_hms_opt(14, 32, 15)
            .unwrap(),
        items: vec![
            LineItem {
                name: "Coffee".to_string(),
                quantity: 2,
                unit_price: Decimal::new(350, 2),
                line_total: Decimal::new(700, 2),
            },
            LineItem {
                name: "Bagel".to_string(),
                quantity: 1,
                unit_price: Decimal::new(225, 2),
                line_total: Decimal::new(225, 2),
            },
        ],
        subtotal: Decimal::new(925, 2),
        tax_rate: Decimal::from(8),
        tax_amount: Decimal::new(74, 2),
        grand_total: Decimal::new(999, 2),
    }
}
