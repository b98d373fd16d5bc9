use crate::config::BatchConfig;
use crate::delivery::Delivery;
use crate::error::IngestError;
use crate::store::StoreFactory;
use dw_events::bus::EventBus;
use dw_events::types::EventRecord;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{error, info};

const STATS_INTERVAL: Duration = Duration::from_secs(30);

pub type BatchResult = Result<(), IngestError>;

/// Writes one batch of validated events atomically. Called from a blocking
/// thread.
pub trait BatchSink: Send + Sync + 'static {
    fn write_batch(&self, records: &[EventRecord]) -> BatchResult;
}

/// Sink backed by the event store: one transaction per batch, projections
/// maintained inline.
pub struct StoreSink<F: StoreFactory> {
    factory: F,
    event_bus: EventBus,
}

impl<F: StoreFactory> StoreSink<F> {
    pub fn new(factory: F, event_bus: EventBus) -> Self {
        Self { factory, event_bus }
    }
}

impl<F: StoreFactory> BatchSink for StoreSink<F> {
    fn write_batch(&self, records: &[EventRecord]) -> BatchResult {
        let store = self.factory.open()?;
        Delivery::new(store, self.event_bus.clone())
            .events()
            .append_batch(records)?;
        Ok(())
    }
}

struct Job {
    record: EventRecord,
    reply: oneshot::Sender<BatchResult>,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    flush_batches: AtomicU64,
    flush_events: AtomicU64,
    flush_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatcherStats {
    pub queue_len: usize,
    pub queue_cap: usize,
    pub accepted: u64,
    pub flush_batches: u64,
    pub flush_events: u64,
    pub flush_errors: u64,
}

/// Bounded queue in front of the sink with a single consumer that groups
/// submissions into batches.
#[derive(Clone)]
pub struct IngestBatcher {
    tx: mpsc::Sender<Job>,
    counters: Arc<Counters>,
}

impl IngestBatcher {
    /// Spawns the consumer task; must be called inside a tokio runtime.
    pub fn start(sink: Arc<dyn BatchSink>, config: BatchConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity());
        let counters = Arc::new(Counters::default());
        let batcher = Self {
            tx,
            counters: Arc::clone(&counters),
        };
        // The consumer only holds a weak sender; dropping every handle ends it.
        let stats_tx = batcher.tx.downgrade();
        tokio::spawn(run_consumer(rx, sink, config, counters, stats_tx));
        batcher
    }

    /// Queues a record without waiting. A full queue is `Busy`.
    pub fn enqueue(
        &self,
        record: EventRecord,
    ) -> Result<oneshot::Receiver<BatchResult>, IngestError> {
        let (reply, result) = oneshot::channel();
        match self.tx.try_send(Job { record, reply }) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(result)
            }
            Err(TrySendError::Full(_)) => Err(IngestError::Busy),
            Err(TrySendError::Closed(_)) => Err(IngestError::Internal {
                message: "ingest batcher stopped".to_string(),
            }),
        }
    }

    /// Queues a record and waits for the outcome of the batch it lands in.
    pub async fn submit(&self, record: EventRecord) -> BatchResult {
        let result = self.enqueue(record)?;
        result.await.unwrap_or_else(|_| {
            Err(IngestError::Internal {
                message: "ingest batch dropped".to_string(),
            })
        })
    }

    pub fn stats(&self) -> BatcherStats {
        snapshot(&self.tx, &self.counters)
    }
}

fn snapshot(tx: &mpsc::Sender<Job>, counters: &Counters) -> BatcherStats {
    let queue_cap = tx.max_capacity();
    BatcherStats {
        queue_len: queue_cap - tx.capacity(),
        queue_cap,
        accepted: counters.accepted.load(Ordering::Relaxed),
        flush_batches: counters.flush_batches.load(Ordering::Relaxed),
        flush_events: counters.flush_events.load(Ordering::Relaxed),
        flush_errors: counters.flush_errors.load(Ordering::Relaxed),
    }
}

async fn run_consumer(
    mut rx: mpsc::Receiver<Job>,
    sink: Arc<dyn BatchSink>,
    config: BatchConfig,
    counters: Arc<Counters>,
    stats_tx: mpsc::WeakSender<Job>,
) {
    let mut pending: Vec<Job> = Vec::with_capacity(config.size);

    // First flush tick is one full interval out, not immediate.
    let mut flush_ticker = interval_at(
        Instant::now() + config.flush_interval,
        config.flush_interval,
    );
    flush_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats_ticker = interval(STATS_INTERVAL);
    stats_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    stats_ticker.tick().await;

    loop {
        tokio::select! {
            job = rx.recv() => {
                let Some(job) = job else {
                    break;
                };
                pending.push(job);
                if pending.len() >= config.size {
                    flush(&sink, &mut pending, &counters).await;
                }
            }
            _ = flush_ticker.tick() => {
                if !pending.is_empty() {
                    flush(&sink, &mut pending, &counters).await;
                }
            }
            _ = stats_ticker.tick() => {
                if let Some(tx) = stats_tx.upgrade() {
                    let stats = snapshot(&tx, &counters);
                    info!(
                        queue_len = stats.queue_len,
                        queue_cap = stats.queue_cap,
                        accepted = stats.accepted,
                        flush_batches = stats.flush_batches,
                        flush_events = stats.flush_events,
                        flush_errors = stats.flush_errors,
                        "ingest batcher stats"
                    );
                }
            }
        }
    }

    if !pending.is_empty() {
        flush(&sink, &mut pending, &counters).await;
    }
}

async fn flush(sink: &Arc<dyn BatchSink>, pending: &mut Vec<Job>, counters: &Counters) {
    let (records, replies): (Vec<EventRecord>, Vec<oneshot::Sender<BatchResult>>) = pending
        .drain(..)
        .map(|job| (job.record, job.reply))
        .unzip();
    let batch_size = records.len();

    let sink = Arc::clone(sink);
    let result = match tokio::task::spawn_blocking(move || sink.write_batch(&records)).await {
        Ok(result) => result,
        Err(err) => Err(IngestError::Internal {
            message: format!("batch writer failed: {err}"),
        }),
    };

    match &result {
        Ok(()) => {
            counters.flush_batches.fetch_add(1, Ordering::Relaxed);
            counters
                .flush_events
                .fetch_add(batch_size as u64, Ordering::Relaxed);
        }
        Err(err) => {
            counters.flush_errors.fetch_add(1, Ordering::Relaxed);
            error!(batch_size, error = %err, "ingest batch flush failed");
        }
    }

    for reply in replies {
        // The caller may have given up waiting.
        let _ = reply.send(result.clone());
    }
}
