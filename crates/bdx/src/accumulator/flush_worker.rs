//! 🗑️ The FlushWorker: takes batches from a channel, throws them at the store, tells the
//! reporter how it went. Patient, tireless, deeply unbothered by the chaos upstream.
//!
//! ⚠️ When the singularity occurs, the FlushWorker will still be draining the channel.
//! It will not notice. It does not notice things. It only flushes. 🦆

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BulkCounters, Shared, Worker};
use crate::backends::DocumentStore;
use crate::common::WriteOperation;
use crate::outcomes::{self, BulkItemError, ItemOutcome};

#[derive(Debug)]
pub(super) struct FlushWorker {
    worker_id: usize,
    rx: Receiver<Vec<WriteOperation>>,
    shared: Arc<Shared>,
}

impl FlushWorker {
    pub(super) fn new(worker_id: usize, rx: Receiver<Vec<WriteOperation>>, shared: Arc<Shared>) -> Self {
        Self { worker_id, rx, shared }
    }

    /// 📡 One batch, one bulk request, one verdict per item. No retries. Retries are a lifestyle.
    async fn flush(&self, batch: Vec<WriteOperation>) {
        let counters = &self.shared.counters;
        BulkCounters::bump(&counters.requests, 1);
        BulkCounters::bump(&counters.flushed, batch.len() as u64);

        let mut verdicts = match self.shared.store.bulk(&batch).await {
            Ok(verdicts) => verdicts,
            Err(err) => {
                // 💀 the whole request went down. everybody on board gets the same bad news.
                warn!(
                    "💀 Worker {} lost a bulk request of {} operations: {:#}",
                    self.worker_id,
                    batch.len(),
                    err
                );
                vec![Err(BulkItemError::Transport(format!("{err:#}"))); batch.len()]
            }
        };
        verdicts.resize(batch.len(), Err(BulkItemError::MissingFromResponse));

        for (operation, verdict) in batch.iter().zip(&verdicts) {
            tally(counters, verdict);
            outcomes::deliver(
                self.shared.reporter.as_ref(),
                operation.target_index(),
                operation.document_id(),
                verdict,
            );
        }
        self.shared.pending.fetch_sub(batch.len(), Ordering::AcqRel);
    }
}

fn tally(counters: &BulkCounters, verdict: &ItemOutcome) {
    match verdict {
        Ok(ack) => {
            BulkCounters::bump(&counters.indexed, 1);
            match ack.result.as_str() {
                "created" => BulkCounters::bump(&counters.created, 1),
                "updated" => BulkCounters::bump(&counters.updated, 1),
                "deleted" => BulkCounters::bump(&counters.deleted, 1),
                _ => {}
            }
        }
        Err(_) => BulkCounters::bump(&counters.failed, 1),
    }
}

impl Worker for FlushWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 FlushWorker {} started draining the batch channel", self.worker_id);
            // 🔄 recv only errors once the channel is closed AND empty, so close() drains everything
            while let Ok(batch) = self.rx.recv().await {
                debug!("🪣 FlushWorker {} picked up {} operations", self.worker_id, batch.len());
                self.flush(batch).await;
            }
            debug!("🏁 FlushWorker {}: channel closed and empty. Clocking out.", self.worker_id);
            Ok(())
        })
    }
}
