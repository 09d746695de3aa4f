//! 📦 bdx: batched document indexing for OpenSearch.
//!
//! Hand a [`Client`] a document and it comes back immediately. The document waits in a
//! shared buffer until there are enough bytes or enough time has passed, then rides to the
//! cluster in one `_bulk` request with everything else. How each document fared is told to
//! an [`OutcomeReporter`], one call per document.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use bdx::{Client, IndexCategory, load_config};
//!
//! let config = load_config(Some(std::path::Path::new("bdx.toml")))?;
//! let client = Client::connect(&config).await?;
//! client.index_document(IndexCategory::Sessions, "session-42", &serde_json::json!({"user": "elaine"}))?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

mod accumulator;
pub mod app_config;
pub mod backends;
pub mod client;
pub mod common;
pub mod error;
pub mod indices;
pub mod outcomes;

pub use accumulator::{BulkConfig, BulkStats, EnqueueError};
pub use app_config::{AppConfig, load_config};
pub use backends::{DocumentStore, InMemoryStore, OpenSearchConfig, OpenSearchStore, StoreBackend};
pub use client::Client;
pub use common::{Action, FieldName, InvalidFieldName, WriteOperation};
pub use error::ClientError;
pub use indices::{IndexCategory, IndexResolver};
pub use outcomes::{
    BulkItemAck, BulkItemError, ItemOutcome, OutcomeReporter, RecordedOutcome, RecordingReporter,
    TracingReporter,
};
