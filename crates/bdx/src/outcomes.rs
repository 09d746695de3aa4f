//! 📣 Outcome reporting: the part where somebody finally finds out how it went.
//!
//! 🎬 By the time the backend answers, the caller that enqueued the document has long
//! since returned, moved on, possibly gotten married. Nobody is waiting on the other end
//! of a `Result`. So each item's fate gets announced to an [`OutcomeReporter`] instead.
//! Exactly once per item. Success or failure. No encores.
//!
//! ⚠️ A reporter must not be able to break the flush loop. Whatever it does (log, count,
//! panic because somebody put an `unwrap` in a metrics exporter) stays in here.

use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info};

/// ✅ What the backend said about one item that went fine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemAck {
    /// 📡 HTTP-ish status for the item: 200, 201, and friends.
    pub status: u16,
    /// 🏷️ `created`, `updated`, `deleted`, `noop`, `not_found`... the backend's one-word review.
    pub result: String,
}

/// 💀 Why one item didn't make it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BulkItemError {
    /// 🚫 The backend read the item and said no.
    #[error("[{status}] {error_type} {reason}")]
    Rejected {
        status: u16,
        error_type: String,
        reason: String,
    },
    /// 📡 The whole request went sideways (network, 5xx, garbage body). Every item in it
    /// gets one of these, the same way everyone on a cancelled flight gets the same email.
    #[error("bulk request failed: {0}")]
    Transport(String),
    /// 👻 The response had fewer items than we sent. This one fell through the cracks.
    #[error("item was missing from the bulk response")]
    MissingFromResponse,
}

/// 🎲 One item's fate, as decided by the backend.
pub type ItemOutcome = Result<BulkItemAck, BulkItemError>;

/// 📣 Receives exactly one call per submitted item, from a flush worker, long after the
/// original caller returned.
///
/// Implementations should be cheap and must not block for long: they run inline on
/// the worker that's trying to drain the next batch.
pub trait OutcomeReporter: Send + Sync + Debug {
    fn on_success(&self, target_index: &str, document_id: &str, ack: &BulkItemAck);
    fn on_failure(&self, target_index: &str, document_id: &str, failure: &BulkItemError);
}

/// 🍞 The default reporter: breadcrumbs in the logs, one per document.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl OutcomeReporter for TracingReporter {
    fn on_success(&self, target_index: &str, document_id: &str, ack: &BulkItemAck) {
        info!(
            "✅ ({} : {}) [{}] {}",
            target_index, document_id, ack.status, ack.result
        );
    }

    fn on_failure(&self, target_index: &str, document_id: &str, failure: &BulkItemError) {
        error!("💀 ({} : {}) {}", target_index, document_id, failure);
    }
}

/// 📝 One line in a [`RecordingReporter`]'s diary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOutcome {
    pub target_index: String,
    pub document_id: String,
    pub outcome: ItemOutcome,
}

/// 📝 A reporter that never forgets. Clone it before handing it to the client,
/// then read the diary afterwards. The `Arc` means everyone shares the same pages.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    recorded: Arc<Mutex<Vec<RecordedOutcome>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<RecordedOutcome> {
        self.recorded.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.recorded.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.lock().is_empty()
    }

    pub fn successes(&self) -> usize {
        self.recorded.lock().iter().filter(|o| o.outcome.is_ok()).count()
    }

    pub fn failures(&self) -> usize {
        self.recorded.lock().iter().filter(|o| o.outcome.is_err()).count()
    }

    fn record(&self, target_index: &str, document_id: &str, outcome: ItemOutcome) {
        self.recorded.lock().push(RecordedOutcome {
            target_index: target_index.to_string(),
            document_id: document_id.to_string(),
            outcome,
        });
    }
}

impl OutcomeReporter for RecordingReporter {
    fn on_success(&self, target_index: &str, document_id: &str, ack: &BulkItemAck) {
        self.record(target_index, document_id, Ok(ack.clone()));
    }

    fn on_failure(&self, target_index: &str, document_id: &str, failure: &BulkItemError) {
        self.record(target_index, document_id, Err(failure.clone()));
    }
}

/// 🛡️ Hands one outcome to the reporter and swallows any panic it throws.
///
/// The worker calling this has more batches to drain. A reporter tantrum gets logged
/// and the show goes on.
pub(crate) fn deliver(
    reporter: &dyn OutcomeReporter,
    target_index: &str,
    document_id: &str,
    outcome: &ItemOutcome,
) {
    let delivered = catch_unwind(AssertUnwindSafe(|| match outcome {
        Ok(ack) => reporter.on_success(target_index, document_id, ack),
        Err(failure) => reporter.on_failure(target_index, document_id, failure),
    }));
    if delivered.is_err() {
        error!(
            "💀 Outcome reporter panicked while reporting ({} : {}). Swallowed it. The flush loop lives on.",
            target_index, document_id
        );
    }
}
