//! BufferedStore - pending sequence, flush loop and shutdown drain
//!
//! Appenders push whole batches at the tail under a short-lived lock. A single
//! flush at a time snapshots the current prefix, saves it outside the lock and,
//! on success, pops exactly that prefix from the head. Anything appended while
//! the save was in flight stays queued for the next flush.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use contracts::{EventRecord, RecordSink, StoreSettings};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::StoreError;
use crate::metrics::StoreMetrics;

/// Buffered store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Period of the background flush loop
    pub flush_interval: Duration,
    /// Upper bound on a single sink save
    pub save_timeout: Duration,
    /// Pending length at which an advisory warning is logged
    pub high_water_mark: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(5),
            save_timeout: Duration::from_secs(30),
            high_water_mark: None,
        }
    }
}

impl From<&StoreSettings> for StoreConfig {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            flush_interval: settings.flush_interval,
            save_timeout: settings.save_timeout,
            high_water_mark: settings.high_water_mark,
        }
    }
}

/// Pending sequence, stored as the batches handed to `append`.
///
/// `records` always equals the summed length of `chunks`.
#[derive(Default)]
struct Pending {
    chunks: VecDeque<Arc<[EventRecord]>>,
    records: usize,
}

/// Prefix captured at flush start
struct Snapshot {
    chunks: Vec<Arc<[EventRecord]>>,
    records: usize,
}

impl Snapshot {
    fn to_batch(&self) -> Vec<EventRecord> {
        let mut batch = Vec::with_capacity(self.records);
        for chunk in &self.chunks {
            batch.extend(chunk.iter().cloned());
        }
        batch
    }
}

/// In-memory record buffer flushed periodically to a sink
pub struct BufferedStore<S> {
    sink: S,
    config: StoreConfig,
    pending: Mutex<Pending>,
    /// Serializes flushes so two callers never snapshot the same prefix
    flush_gate: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    above_high_water: AtomicBool,
    metrics: StoreMetrics,
}

impl<S: RecordSink + Sync + 'static> BufferedStore<S> {
    /// Create a store with its own cancellation token
    pub fn new(sink: S, config: StoreConfig) -> Arc<Self> {
        Self::with_cancellation(sink, config, CancellationToken::new())
    }

    /// Create a store whose flush loop also stops when `cancel` fires
    pub fn with_cancellation(sink: S, config: StoreConfig, cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            sink,
            config,
            pending: Mutex::new(Pending::default()),
            flush_gate: tokio::sync::Mutex::new(()),
            cancel,
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
            above_high_water: AtomicBool::new(false),
            metrics: StoreMetrics::new(),
        })
    }

    /// Get the sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Get configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get current metrics
    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    /// Number of records waiting to be flushed
    pub fn pending_len(&self) -> usize {
        self.lock_pending().records
    }

    /// Append records at the tail of the pending sequence
    ///
    /// Relative order of `records` is preserved. An empty batch is a no-op.
    pub fn append(&self, records: Vec<EventRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let count = records.len();
        let chunk: Arc<[EventRecord]> = records.into();

        let pending_len = {
            let mut pending = self.lock_pending();
            pending.chunks.push_back(chunk);
            pending.records += count;
            pending.records
        };

        self.metrics.add_appended(count);
        self.metrics.set_pending(pending_len);
        observability::record_pending_depth(pending_len);
        self.check_high_water(pending_len);

        Ok(())
    }

    /// Spawn the periodic flush loop as a background task
    pub fn start(self: &Arc<Self>) -> Result<(), StoreError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(StoreError::AlreadyStarted);
        }

        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            store.run().await;
        });

        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Flush loop body; returns once the store is cancelled
    ///
    /// A failed flush is logged and retried on the next tick with whatever has
    /// accumulated since. The first tick fires one full interval after start.
    /// Cancellation also cuts short an in-flight periodic save.
    #[instrument(name = "store_flush_loop", skip(self), fields(sink = %self.sink.name()))]
    pub async fn run(&self) {
        let period = self.config.flush_interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(flush_interval = ?period, "Storage has been started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // A save abandoned here leaves pending untouched for the drain in `stop`.
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Periodic flush interrupted by shutdown");
                    break;
                }
                result = self.flush() => {
                    if let Err(e) = result {
                        error!(batch_len = self.pending_len(), error = %e, "Failed to flush");
                    }
                }
            }
        }

        debug!("Flush loop exited");
    }

    /// Persist the current pending prefix
    ///
    /// Returns the number of records saved. On error nothing is removed.
    #[instrument(name = "store_flush", skip(self), fields(sink = %self.sink.name()))]
    pub async fn flush(&self) -> Result<usize, StoreError> {
        let _gate = self.flush_gate.lock().await;

        let snapshot = self.snapshot_prefix();
        if snapshot.records == 0 {
            return Ok(0);
        }

        let batch = snapshot.to_batch();
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.config.save_timeout, self.sink.save(&batch)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(StoreError::from(e)),
            Err(_) => Err(StoreError::save_timeout(self.sink.name(), self.config.save_timeout)),
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        if let Err(e) = outcome {
            self.metrics.inc_failure_count();
            observability::record_flush(false, batch.len(), elapsed_ms);
            return Err(e);
        }

        self.remove_prefix(&snapshot);
        self.metrics.record_flush(snapshot.records);
        observability::record_flush(true, snapshot.records, elapsed_ms);

        info!(
            entries_count = snapshot.records,
            elapsed_ms = format!("{elapsed_ms:.1}"),
            "Save entries to persistent storage"
        );

        Ok(snapshot.records)
    }

    /// Stop the flush loop and drain what is left
    ///
    /// Order is fixed: cancel, wait for the loop task to exit, one final flush.
    /// Records appended after this call begins may or may not be included.
    #[instrument(name = "store_stop", skip(self), fields(sink = %self.sink.name()))]
    pub async fn stop(&self) -> Result<(), StoreError> {
        self.cancel.cancel();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                error!(error = ?e, "Flush loop task panicked");
            }
        }

        match self.flush().await {
            Ok(drained) => {
                info!(drained, "Storage has been stopped");
                Ok(())
            }
            Err(e) => {
                let pending = self.pending_len();
                error!(pending, error = %e, "Can't properly stop storage");
                Err(StoreError::Drain {
                    pending,
                    source: Box::new(e),
                })
            }
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Pending> {
        // Pending is only touched by push_back/pop_front, so a panicking
        // holder cannot leave it inconsistent.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_prefix(&self) -> Snapshot {
        let pending = self.lock_pending();
        Snapshot {
            chunks: pending.chunks.iter().cloned().collect(),
            records: pending.records,
        }
    }

    fn remove_prefix(&self, snapshot: &Snapshot) {
        let pending_len = {
            let mut pending = self.lock_pending();
            debug_assert!(pending.chunks.len() >= snapshot.chunks.len());
            pending.chunks.drain(..snapshot.chunks.len());
            pending.records -= snapshot.records;
            pending.records
        };

        self.metrics.set_pending(pending_len);
        observability::record_pending_depth(pending_len);

        if let Some(mark) = self.config.high_water_mark {
            if pending_len < mark {
                self.above_high_water.store(false, Ordering::Relaxed);
            }
        }
    }

    fn check_high_water(&self, pending_len: usize) {
        let Some(mark) = self.config.high_water_mark else {
            return;
        };
        if pending_len >= mark && !self.above_high_water.swap(true, Ordering::Relaxed) {
            warn!(
                pending = pending_len,
                high_water_mark = mark,
                "Pending records above high-water mark, sink may be falling behind"
            );
        }
    }
}
