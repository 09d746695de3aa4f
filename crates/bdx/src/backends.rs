//! 🔌 Backends: where the real I/O happens.
//!
//! 🎭 This module is the casting agency for document stores. Need a real OpenSearch
//! cluster? We've got one. Need a pretend one that lives in RAM and remembers every bulk
//! call like an elephant with a clipboard? Also got one.
//!
//! Everything above this layer (the accumulator, the client) talks to a [`StoreBackend`]
//! and has no idea which one it got. Ignorance is a feature. It's called "abstraction."
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::WriteOperation;
use crate::outcomes::{BulkItemAck, ItemOutcome};

pub mod in_mem;
pub mod opensearch;

pub use in_mem::{InMemoryStore, RecordedBulkCall};
pub use opensearch::{OpenSearchConfig, OpenSearchStore};

/// 🗄️ The document store capability bdx consumes.
///
/// # Contract 📜
/// - `ping` proves the store is reachable and our credentials are welcome. Called once at
///   construction so misconfiguration fails fast instead of 50,000 documents later.
/// - `bulk` submits all operations in one request and returns one outcome per operation, in
///   request order. An `Err` means the request as a whole failed; callers fan that out to
///   every item. It does not retry. Retries are somebody else's hobby.
/// - `index` writes one document and waits for the acknowledgement.
#[async_trait]
pub trait DocumentStore: std::fmt::Debug + Send + Sync {
    /// 📡 "Hello? Is this thing on?"
    async fn ping(&self) -> Result<()>;
    /// 📦 One request, many documents, many verdicts.
    async fn bulk(&self, operations: &[WriteOperation]) -> Result<Vec<ItemOutcome>>;
    /// 🎯 One request, one document, one verdict, and the caller is waiting for it.
    async fn index(&self, target_index: &str, document_id: &str, body: String) -> Result<BulkItemAck>;
}

/// 🎭 The many faces of a document store.
///
/// Dispatches via `impl DocumentStore for StoreBackend`, so the accumulator never needs to
/// know whether its batches land on a cluster or in a `Vec`.
#[derive(Debug)]
pub enum StoreBackend {
    OpenSearch(OpenSearchStore),
    InMemory(InMemoryStore),
}

#[async_trait]
impl DocumentStore for StoreBackend {
    async fn ping(&self) -> Result<()> {
        match self {
            StoreBackend::OpenSearch(store) => store.ping().await,
            StoreBackend::InMemory(store) => store.ping().await,
        }
    }

    async fn bulk(&self, operations: &[WriteOperation]) -> Result<Vec<ItemOutcome>> {
        match self {
            StoreBackend::OpenSearch(store) => store.bulk(operations).await,
            StoreBackend::InMemory(store) => store.bulk(operations).await,
        }
    }

    async fn index(&self, target_index: &str, document_id: &str, body: String) -> Result<BulkItemAck> {
        match self {
            StoreBackend::OpenSearch(store) => store.index(target_index, document_id, body).await,
            StoreBackend::InMemory(store) => store.index(target_index, document_id, body).await,
        }
    }
}

impl From<OpenSearchStore> for StoreBackend {
    fn from(store: OpenSearchStore) -> Self {
        StoreBackend::OpenSearch(store)
    }
}

impl From<InMemoryStore> for StoreBackend {
    fn from(store: InMemoryStore) -> Self {
        StoreBackend::InMemory(store)
    }
}
