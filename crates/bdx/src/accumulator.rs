//! 🎬 *[a buffer fills with write operations. somewhere, a worker waits.]*
//! *[the clock on the wall reads 2:47am. nobody is awake to see the flush.]*
//!
//! 📦 The Accumulator: decouples "I want this indexed" from "the cluster said ok".
//!
//! Callers `add` operations into one shared buffer. The buffer is swapped out whole as a
//! batch when it gets heavy enough (`flush_bytes`) or old enough (`flush_interval`),
//! whichever comes first, and the batch is handed over a channel to a fixed pool of
//! [`FlushWorker`]s. Each worker turns a batch into one bulk request and reports every item.
//!
//! ```text
//!   add ──lock──▶ Buffer ──swap on size──┐
//!                   ▲                    ├──▶ channel ──▶ FlushWorker × N ──▶ store.bulk ──▶ reporter
//!   FlushTimer ─────┘──swap on age───────┘
//! ```
//!
//! 🔒 The buffer lock covers append and swap (including the non-blocking hand-off to the
//! unbounded channel). Nothing under it touches the network. A worker can be mid-flush for
//! thirty seconds and `add` won't notice.
//!
//! ⚠️ `close()` is the only thing here that waits on the cluster. Call it at shutdown.
//! Dropping without it still starts the drain, but nobody waits around to see it finish.

mod flush_timer;
mod flush_worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::{Sender, TrySendError};
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::backends::StoreBackend;
use crate::common::WriteOperation;
use crate::outcomes::{self, BulkItemError, ItemOutcome, OutcomeReporter};
use flush_timer::FlushTimer;
use flush_worker::FlushWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// "What's the DEAL with lifetime annotations? You borrow something,
///  you give it back. It's not that hard, Jerry!" -- Seinfeld, on Rust
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust but verify.
    fn start(self) -> JoinHandle<Result<()>>;
}

/// 🔧 How the accumulator batches.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BulkConfig {
    /// 🧵 Parallel flush workers. Defaults to however many cores the OS admits to.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// 📦 Flush once buffered bodies reach this many bytes.
    #[serde(default = "default_flush_bytes")]
    pub flush_bytes: usize,
    /// ⏱️ Flush once the oldest buffered operation has waited this long.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// 🚧 Max operations buffered or in flight before `add` says `QueueFull`.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

// 📦 5MB. Big enough to be worth a round trip, small enough not to scare the cluster.
fn default_flush_bytes() -> usize {
    5_000_000
}

// ⏱️ 10 seconds. Long enough to batch, short enough that dashboards don't look broken.
fn default_flush_interval_ms() -> u64 {
    10_000
}

fn default_queue_capacity() -> usize {
    65_536
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            flush_bytes: default_flush_bytes(),
            flush_interval_ms: default_flush_interval_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl BulkConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// 💀 Why an operation couldn't even get into the buffer.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("💀 The bulk queue is full ({capacity} operations pending). The cluster is slower than the callers. Something has to give, and today it's this write.")]
    QueueFull { capacity: usize },
    #[error("💀 The bulk indexer is closed. This write showed up after last call.")]
    Closed,
}

/// 📊 A snapshot of what the accumulator has been up to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkStats {
    /// Operations accepted by `add`.
    pub added: u64,
    /// Operations handed to the store in a bulk request.
    pub flushed: u64,
    /// Items that came back as failures, for whatever reason.
    pub failed: u64,
    /// Items that came back as successes.
    pub indexed: u64,
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    /// Bulk requests sent.
    pub requests: u64,
}

#[derive(Debug, Default)]
struct BulkCounters {
    added: AtomicU64,
    flushed: AtomicU64,
    failed: AtomicU64,
    indexed: AtomicU64,
    created: AtomicU64,
    updated: AtomicU64,
    deleted: AtomicU64,
    requests: AtomicU64,
}

impl BulkCounters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BulkStats {
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        BulkStats {
            added: read(&self.added),
            flushed: read(&self.flushed),
            failed: read(&self.failed),
            indexed: read(&self.indexed),
            created: read(&self.created),
            updated: read(&self.updated),
            deleted: read(&self.deleted),
            requests: read(&self.requests),
        }
    }
}

/// 📥 The one buffer everybody appends to.
#[derive(Debug, Default)]
struct Buffer {
    operations: Vec<WriteOperation>,
    bytes: usize,
    oldest: Option<Instant>,
    closed: bool,
}

impl Buffer {
    /// Returns whether the buffer was empty before this push.
    fn push(&mut self, operation: WriteOperation) -> bool {
        let was_empty = self.operations.is_empty();
        if was_empty {
            self.oldest = Some(Instant::now());
        }
        self.bytes += operation.size_bytes();
        self.operations.push(operation);
        was_empty
    }

    fn take(&mut self) -> Vec<WriteOperation> {
        self.bytes = 0;
        self.oldest = None;
        std::mem::take(&mut self.operations)
    }
}

/// 🧠 Everything the workers, the timer and `add` share.
#[derive(Debug)]
struct Shared {
    buffer: Mutex<Buffer>,
    batches: Sender<Vec<WriteOperation>>,
    timer_wake: Notify,
    pending: AtomicUsize,
    counters: BulkCounters,
    store: Arc<StoreBackend>,
    reporter: Arc<dyn OutcomeReporter>,
    flush_bytes: usize,
    flush_interval: Duration,
    queue_capacity: usize,
}

impl Shared {
    /// 🔄 Swaps the buffer out and hands it to the workers. Caller holds the buffer lock.
    fn dispatch_locked(&self, buffer: &mut Buffer, trigger: &str) {
        if buffer.operations.is_empty() {
            return;
        }
        let bytes = buffer.bytes;
        let batch = buffer.take();
        debug!(
            "📦 Flushing {} operations ({} bytes), triggered by {}",
            batch.len(),
            bytes,
            trigger
        );
        if let Err(TrySendError::Closed(batch) | TrySendError::Full(batch)) = self.batches.try_send(batch) {
            // 💀 only reachable if the channel closed under us, which the lock discipline forbids.
            error!("💀 Batch channel refused {} operations. Reporting them as failed rather than losing them quietly.", batch.len());
            let failure: ItemOutcome = Err(BulkItemError::Transport("bulk indexer shut down before the batch was flushed".to_string()));
            for operation in &batch {
                outcomes::deliver(self.reporter.as_ref(), operation.target_index(), operation.document_id(), &failure);
            }
            BulkCounters::bump(&self.counters.failed, batch.len() as u64);
            self.pending.fetch_sub(batch.len(), Ordering::AcqRel);
        }
    }

    /// ⏱️ Flushes if the oldest buffered operation has waited long enough.
    fn flush_if_due(&self) {
        let mut buffer = self.buffer.lock();
        if buffer
            .oldest
            .is_some_and(|oldest| oldest.elapsed() >= self.flush_interval)
        {
            self.dispatch_locked(&mut buffer, "interval");
        }
    }

    /// 🚪 Stop taking adds, push out what's left, close the channel, wake the timer.
    /// Returns false if somebody already did this.
    fn begin_shutdown(&self) -> bool {
        {
            let mut buffer = self.buffer.lock();
            if buffer.closed {
                return false;
            }
            buffer.closed = true;
            self.dispatch_locked(&mut buffer, "close");
            self.batches.close();
        }
        self.timer_wake.notify_one();
        true
    }
}

/// 📦 The accumulator itself: a shared buffer plus the tasks that drain it.
#[derive(Debug)]
pub(crate) struct Accumulator {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<Result<()>>>>,
}

impl Accumulator {
    /// 🚀 Spawns the flush workers and the flush timer. Must run inside a tokio runtime.
    pub(crate) fn start(
        config: &BulkConfig,
        store: Arc<StoreBackend>,
        reporter: Arc<dyn OutcomeReporter>,
    ) -> Self {
        let (batches_tx, batches_rx) = async_channel::unbounded();
        let shared = Arc::new(Shared {
            buffer: Mutex::new(Buffer::default()),
            batches: batches_tx,
            timer_wake: Notify::new(),
            pending: AtomicUsize::new(0),
            counters: BulkCounters::default(),
            store,
            reporter,
            flush_bytes: config.flush_bytes,
            flush_interval: config.flush_interval(),
            queue_capacity: config.queue_capacity,
        });

        let worker_count = config.workers.max(1);
        let mut tasks = Vec::with_capacity(worker_count + 1);
        for worker_id in 0..worker_count {
            tasks.push(FlushWorker::new(worker_id, batches_rx.clone(), Arc::clone(&shared)).start());
        }
        tasks.push(FlushTimer::new(Arc::clone(&shared)).start());
        debug!(
            "🧵 Bulk accumulator up: {} workers, flush at {} bytes or {:?}",
            worker_count, config.flush_bytes, shared.flush_interval
        );

        Self {
            shared,
            tasks: Mutex::new(tasks),
        }
    }

    /// 📥 Buffers one operation. Blocks only on the buffer lock, never on the network.
    pub(crate) fn add(&self, operation: WriteOperation) -> Result<(), EnqueueError> {
        let shared = &self.shared;
        let mut buffer = shared.buffer.lock();
        if buffer.closed {
            return Err(EnqueueError::Closed);
        }
        if shared.pending.load(Ordering::Acquire) >= shared.queue_capacity {
            return Err(EnqueueError::QueueFull {
                capacity: shared.queue_capacity,
            });
        }
        shared.pending.fetch_add(1, Ordering::AcqRel);
        BulkCounters::bump(&shared.counters.added, 1);

        let was_empty = buffer.push(operation);
        if buffer.bytes >= shared.flush_bytes {
            shared.dispatch_locked(&mut buffer, "size");
        } else if was_empty {
            shared.timer_wake.notify_one();
        }
        Ok(())
    }

    pub(crate) fn stats(&self) -> BulkStats {
        self.shared.counters.snapshot()
    }

    /// 🗑️ Flush everything, wait for every worker to finish, then return.
    ///
    /// Idempotent: a second call finds nothing left to wait for.
    pub(crate) async fn close(&self) -> Result<()> {
        self.shared.begin_shutdown();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for joined in futures::future::join_all(tasks).await {
            joined.context("💀 A bulk worker task panicked on its way out. Some outcomes may never have been reported.")??;
        }
        debug!("🏁 Bulk accumulator closed. Every batch went out the door.");
        Ok(())
    }
}

impl Drop for Accumulator {
    fn drop(&mut self) {
        if self.shared.begin_shutdown() {
            debug!("⚠️ Bulk accumulator dropped without close(); draining in the background, nobody is waiting on it");
        }
    }
}
