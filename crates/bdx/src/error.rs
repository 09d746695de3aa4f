//! 💀 The ways a call into bdx can go wrong *before* the caller walks away.
//!
//! Anything that goes wrong after enqueue (the cluster rejecting an item, the network
//! eating a bulk request) is a [`crate::outcomes::BulkItemError`] and goes to the reporter,
//! not here. The caller already left. Yelling down an empty hallway helps nobody.

use std::time::Duration;

use thiserror::Error;

use crate::accumulator::EnqueueError;
use crate::common::InvalidFieldName;

#[derive(Debug, Error)]
pub enum ClientError {
    /// 🔌 Construction-time. The backend is unreachable or turned us away. Don't proceed.
    #[error("💀 Could not connect to the document store: {0:#}")]
    Connection(anyhow::Error),

    /// 📦 The document could not be encoded. Nothing was enqueued.
    #[error("💀 Could not serialize the {action} body for ({target_index} : {document_id}): {source}")]
    Serialization {
        action: &'static str,
        target_index: String,
        document_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// 🔒 The field name for a scripted append failed the allow-list.
    #[error(transparent)]
    InvalidFieldName(#[from] InvalidFieldName),

    /// 🚧 The buffer wouldn't take the operation.
    #[error(transparent)]
    Enqueue(#[from] EnqueueError),

    /// 📡 The synchronous path reached the backend and it didn't go well.
    #[error("💀 Synchronous write of ({target_index} : {document_id}) failed: {cause:#}")]
    Request {
        target_index: String,
        document_id: String,
        cause: anyhow::Error,
    },

    /// ⏱️ The synchronous path ran out of the caller's patience.
    #[error("💀 Synchronous write of ({target_index} : {document_id}) did not finish within {deadline:?}")]
    DeadlineExceeded {
        target_index: String,
        document_id: String,
        deadline: Duration,
    },

    /// 🗑️ A worker task died while we were waiting for it to drain.
    #[error("💀 Closing the bulk indexer failed: {0:#}")]
    Close(anyhow::Error),
}
