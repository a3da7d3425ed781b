//! Batch manager
//!
//! Swaps accumulate in a FIFO and are flushed (enriched, then inserted) when
//! either the batch is full or `min_batch_frequency_ms` has elapsed since the
//! previous flush. A periodic timer re-evaluates the condition so a trickle of
//! swaps is never held back.
//!
//! - [`ProcessingMode::Queue`]: at most one flush at a time.
//! - [`ProcessingMode::Parallel`]: up to `max_concurrent_flushes` flushes at once.
//!
//! A failed flush puts its swaps back at the front of the queue, in order.

use crate::core::swap::Swap;
use crate::enrich::Enricher;
use crate::error::{IndexerError, Result};
use crate::sink::TradeSink;
use log::{error, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// Wait for the running flush to finish before starting the next one
    Queue,
    /// Flush as soon as a batch is ready
    #[default]
    Parallel,
}

impl FromStr for ProcessingMode {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queue" => Ok(ProcessingMode::Queue),
            "parallel" => Ok(ProcessingMode::Parallel),
            other => Err(IndexerError::Config(format!(
                "processing mode must be \"queue\" or \"parallel\", got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub processing_mode: ProcessingMode,
    pub max_batch_size: usize,
    pub min_batch_frequency_ms: u64,
    /// Upper bound on simultaneous flushes in parallel mode
    pub max_concurrent_flushes: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            processing_mode: ProcessingMode::Parallel,
            max_batch_size: 100,
            min_batch_frequency_ms: 500,
            max_concurrent_flushes: 8,
        }
    }
}

impl BatchConfig {
    #[inline]
    pub fn min_batch_frequency(&self) -> Duration {
        Duration::from_millis(self.min_batch_frequency_ms)
    }
}

/// Timings of one successful flush.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchMetrics {
    pub batch_size: usize,
    pub affected_rows: u64,
    pub queue_latency: Duration,
    pub accounts_latency: Duration,
    pub prices_latency: Duration,
    pub insert_latency: Duration,
}

impl BatchMetrics {
    pub fn total(&self) -> Duration {
        self.queue_latency + self.accounts_latency + self.prices_latency + self.insert_latency
    }

    fn log(&self) {
        info!(
            "\n=== Batch Processing Metrics ===\n\
             Batch size: {} | Affected rows: {}\n\
             Queue latency: {:.2}s\n\
             Fetch accounts latency: {:.2}s\n\
             Fetch prices latency: {:.2}s\n\
             Upsert latency: {:.2}s\n\
             Total processing time: {:.2}s\n\
             ================================",
            self.batch_size,
            self.affected_rows,
            self.queue_latency.as_secs_f64(),
            self.accounts_latency.as_secs_f64(),
            self.prices_latency.as_secs_f64(),
            self.insert_latency.as_secs_f64(),
            self.total().as_secs_f64(),
        );
    }
}

struct BatchState {
    pending: VecDeque<Swap>,
    last_flush: Instant,
}

/// Clears the queue-mode flag when the flush ends, however it ends.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct BatchManager {
    config: BatchConfig,
    state: Mutex<BatchState>,
    flushing: AtomicBool,
    permits: Semaphore,
    in_flight: AtomicUsize,
    enricher: Arc<dyn Enricher>,
    sink: Arc<dyn TradeSink>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl BatchManager {
    /// Create the manager and start its timer. Must be called inside a Tokio runtime.
    pub fn new(
        config: BatchConfig,
        enricher: Arc<dyn Enricher>,
        sink: Arc<dyn TradeSink>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            permits: Semaphore::new(config.max_concurrent_flushes.max(1)),
            config,
            state: Mutex::new(BatchState { pending: VecDeque::new(), last_flush: Instant::now() }),
            flushing: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            enricher,
            sink,
            timer: Mutex::new(None),
        });
        let handle = tokio::spawn(run_timer(Arc::downgrade(&manager), manager.timer_period()));
        *manager.timer.lock() = Some(handle);
        manager
    }

    fn timer_period(&self) -> Duration {
        self.config.min_batch_frequency().max(Duration::from_millis(1))
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Queue swaps without evaluating the flush condition.
    pub fn push(&self, swaps: Vec<Swap>) {
        if swaps.is_empty() {
            return;
        }
        self.state.lock().pending.extend(swaps);
    }

    /// Queue swaps, then flush if the batch is due.
    pub async fn add(&self, swaps: Vec<Swap>) {
        self.push(swaps);
        self.process_if_needed().await;
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Flush one batch if it is due and the processing mode allows another flush.
    pub async fn process_if_needed(&self) {
        match self.config.processing_mode {
            ProcessingMode::Queue => {
                if self
                    .flushing
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    return;
                }
                let _guard = FlushGuard(&self.flushing);
                if let Some(batch) = self.take_due_batch() {
                    self.flush(batch).await;
                }
            }
            ProcessingMode::Parallel => {
                // No permit: every slot is busy, the next trigger picks the batch up.
                let Ok(_permit) = self.permits.try_acquire() else {
                    return;
                };
                if let Some(batch) = self.take_due_batch() {
                    self.in_flight.fetch_add(1, Ordering::AcqRel);
                    self.flush(batch).await;
                    self.in_flight.fetch_sub(1, Ordering::AcqRel);
                }
            }
        }
    }

    /// Decide and drain in one critical section.
    fn take_due_batch(&self) -> Option<Vec<Swap>> {
        let mut state = self.state.lock();
        let len = state.pending.len();
        if len == 0 {
            return None;
        }
        let full = len >= self.config.max_batch_size;
        let due = state.last_flush.elapsed() >= self.config.min_batch_frequency();
        if !full && !due {
            return None;
        }
        state.last_flush = Instant::now();
        let take = len.min(self.config.max_batch_size.max(1));
        Some(state.pending.drain(..take).collect())
    }

    async fn flush(&self, batch: Vec<Swap>) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let oldest = batch.iter().map(|s| s.timestamp).min().unwrap_or(now_ms);
        let queue_latency = Duration::from_millis((now_ms - oldest).max(0) as u64);

        match self.enrich_and_insert(&batch).await {
            Ok(mut metrics) => {
                metrics.queue_latency = queue_latency;
                metrics.log();
            }
            Err(e) => {
                error!("Error processing batch of {} swaps: {}", batch.len(), e);
                self.requeue(batch);
            }
        }
    }

    async fn enrich_and_insert(&self, batch: &[Swap]) -> Result<BatchMetrics> {
        let enrichment = self.enricher.enrich(batch).await?;

        let started = Instant::now();
        let affected_rows = self.sink.insert_trades(&enrichment.trades).await?;

        Ok(BatchMetrics {
            batch_size: batch.len(),
            affected_rows,
            queue_latency: Duration::ZERO,
            accounts_latency: enrichment.accounts_latency,
            prices_latency: enrichment.prices_latency,
            insert_latency: started.elapsed(),
        })
    }

    fn requeue(&self, batch: Vec<Swap>) {
        let mut state = self.state.lock();
        for swap in batch.into_iter().rev() {
            state.pending.push_front(swap);
        }
    }

    /// Stop the timer. Queued swaps are not drained.
    pub fn shutdown(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for BatchManager {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_timer(manager: Weak<BatchManager>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(manager) = manager.upgrade() else {
            break;
        };
        tokio::spawn(async move {
            manager.process_if_needed().await;
        });
    }
}
