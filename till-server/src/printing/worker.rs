//! Print worker
//!
//! Runs `print_receipt` off the caller's task. Callers submit jobs through a
//! [`PrintHandle`] and await the [`PrintTicket`] for the result.

use std::sync::Arc;

use shared::SaleRecord;
use till_printer::ConnectorFactory;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::manager::PrinterManager;
use super::types::{PrintErrorKind, PrintResult};

struct PrintJob {
    sale: SaleRecord,
    profile: String,
    reply: oneshot::Sender<PrintResult>,
}

/// Jobs allowed to run at once unless configured otherwise
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Dispatch loop
///
/// Up to `max_in_flight` jobs run at once, so different printers print in
/// parallel; the manager's device locks serialise jobs for one printer.
/// When every slot is busy, jobs stay in the queue and `submit` waits once
/// the queue is full.
pub struct PrintWorker<F: ConnectorFactory> {
    manager: Arc<PrinterManager<F>>,
    jobs: mpsc::Receiver<PrintJob>,
    max_in_flight: usize,
}

impl<F: ConnectorFactory> PrintWorker<F> {
    /// Worker with a queue of `capacity` pending jobs
    pub fn new(manager: Arc<PrinterManager<F>>, capacity: usize) -> (Self, PrintHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = Self {
            manager,
            jobs: rx,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        };
        (worker, PrintHandle { jobs: tx })
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Run until shutdown is signalled or every handle is dropped,
    /// then wait for jobs already dispatched
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(max_in_flight = self.max_in_flight, "Print worker started");
        let slots = Arc::new(Semaphore::new(self.max_in_flight));
        let mut in_flight = JoinSet::new();

        'dispatch: loop {
            // Take a job off the queue only once a slot is free
            let slot = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Print worker received shutdown signal");
                    break;
                }
                slot = slots.clone().acquire_owned() => match slot {
                    Ok(slot) => slot,
                    Err(_) => break,
                },
            };

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Print worker received shutdown signal");
                        break 'dispatch;
                    }
                    job = self.jobs.recv() => {
                        let Some(job) = job else {
                            tracing::info!("Print queue closed, print worker stopping");
                            break 'dispatch;
                        };
                        if job.reply.is_closed() {
                            tracing::debug!(
                                order_id = %job.sale.order_id,
                                profile = %job.profile,
                                "Print job abandoned before dispatch, skipping"
                            );
                            continue;
                        }
                        let manager = self.manager.clone();
                        in_flight.spawn(async move {
                            let PrintJob { sale, profile, reply } = job;
                            let result = manager
                                .print_receipt_unless(&sale, &profile, &|| reply.is_closed())
                                .await;
                            // The caller may have stopped waiting; the result is discarded then
                            let _ = reply.send(result);
                            drop(slot);
                        });
                        break;
                    }
                    Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                        if let Err(e) = joined {
                            tracing::error!(error = %e, "Print job panicked");
                        }
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Print job panicked");
            }
        }
        tracing::info!("Print worker stopped");
    }
}

/// Cloneable submission side of the print queue
#[derive(Clone)]
pub struct PrintHandle {
    jobs: mpsc::Sender<PrintJob>,
}

impl PrintHandle {
    /// Queue a receipt; waits only if the queue is full
    pub async fn submit(&self, sale: SaleRecord, profile: impl Into<String>) -> PrintTicket {
        let (reply, result) = oneshot::channel();
        let job = PrintJob {
            sale,
            profile: profile.into(),
            reply,
        };
        // A closed queue drops the job and its sender; the ticket reports it
        let _ = self.jobs.send(job).await;
        PrintTicket { result }
    }
}

/// Pending print result
///
/// Dropping the ticket cancels the job as long as no printer has been
/// opened for it yet, including while it waits for a busy printer.
pub struct PrintTicket {
    result: oneshot::Receiver<PrintResult>,
}

impl PrintTicket {
    pub async fn wait(self) -> PrintResult {
        self.result.await.unwrap_or_else(|_| {
            PrintResult::failed(PrintErrorKind::ConnectionFailed, "print worker stopped")
        })
    }
}
