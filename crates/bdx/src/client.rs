//! 🚀 The Client: the front door. Callers hand it documents and walk away.
//!
//! 🎬 *[a request handler indexes a session, returns 200, and forgets. three seconds later,
//! across town, a flush worker tells the logs how it went. the handler never finds out.]*
//!
//! Every write on the buffered path is a plain (non-async) call: resolve the index, encode
//! the body, append to the accumulator, return. Encoding errors come back right away and
//! nothing gets enqueued. Backend verdicts go to the [`OutcomeReporter`] later.
//!
//! A [`Client::Disabled`] client accepts everything and does nothing. Apps that would rather
//! run without indexing than not run at all use [`Client::connect_or_disable`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::ser::Error as _;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::accumulator::{Accumulator, BulkConfig, BulkStats};
use crate::app_config::AppConfig;
use crate::backends::{DocumentStore, OpenSearchStore, StoreBackend};
use crate::common::{Action, FieldName, WriteOperation};
use crate::error::ClientError;
use crate::indices::{IndexCategory, IndexResolver};
use crate::outcomes::{BulkItemAck, OutcomeReporter, TracingReporter};

/// 📡 A handle for writing documents. Cheap to clone; clones share one accumulator.
#[derive(Debug, Clone, Default)]
pub enum Client {
    /// 🙈 Every operation succeeds immediately and touches nothing.
    #[default]
    Disabled,
    /// ✅ Connected and batching.
    Ready(Arc<ReadyClient>),
}

/// 🧠 The parts a connected client is made of.
#[derive(Debug)]
pub struct ReadyClient {
    store: Arc<StoreBackend>,
    resolver: IndexResolver,
    accumulator: Accumulator,
}

impl Client {
    /// 🔌 Connects to the configured cluster and reports outcomes to the logs.
    pub async fn connect(config: &AppConfig) -> Result<Self, ClientError> {
        Self::connect_with_reporter(config, Arc::new(TracingReporter)).await
    }

    /// 🔌 Like [`Client::connect`], with outcomes going wherever `reporter` sends them.
    pub async fn connect_with_reporter(
        config: &AppConfig,
        reporter: Arc<dyn OutcomeReporter>,
    ) -> Result<Self, ClientError> {
        let store = OpenSearchStore::new(config.backend.clone()).map_err(ClientError::Connection)?;
        Self::with_store(store, config.resolver(), &config.bulk, reporter).await
    }

    /// 🏗️ Builds a client over any store. Pings it first; an unreachable store is an error
    /// now, not 50,000 silent failures later.
    pub async fn with_store(
        store: impl Into<StoreBackend>,
        resolver: IndexResolver,
        bulk: &BulkConfig,
        reporter: Arc<dyn OutcomeReporter>,
    ) -> Result<Self, ClientError> {
        let store = Arc::new(store.into());
        store.ping().await.map_err(ClientError::Connection)?;
        info!(
            "🚀 Document client ready (prefix '{}', {} workers)",
            resolver.prefix(),
            bulk.workers.max(1)
        );
        let accumulator = Accumulator::start(bulk, Arc::clone(&store), reporter);
        Ok(Client::Ready(Arc::new(ReadyClient {
            store,
            resolver,
            accumulator,
        })))
    }

    /// 🙈 [`Client::connect`], except failure logs and hands back a disabled client.
    pub async fn connect_or_disable(config: &AppConfig) -> Self {
        match Self::connect(config).await {
            Ok(client) => client,
            Err(err) => {
                error!("💀 Document indexing disabled: {err}");
                Client::Disabled
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Client::Ready(_))
    }

    /// 📊 Accumulator counters. `None` when disabled.
    pub fn stats(&self) -> Option<BulkStats> {
        match self {
            Client::Ready(ready) => Some(ready.accumulator.stats()),
            Client::Disabled => None,
        }
    }

    /// 📄 Buffers a full-document create (or replace).
    pub fn index_document<T: Serialize + ?Sized>(
        &self,
        category: IndexCategory,
        document_id: impl Into<String>,
        document: &T,
    ) -> Result<(), ClientError> {
        let Client::Ready(ready) = self else {
            return Ok(());
        };
        let target_index = ready.resolver.resolve(category);
        let document_id = document_id.into();
        let body = encode("index", &target_index, &document_id, document)?;
        ready.enqueue(WriteOperation::new(target_index, document_id, Action::Create, Some(body)))
    }

    /// 🩹 Buffers a partial update. `partial_fields` must encode to a JSON object.
    pub fn update_document<T: Serialize + ?Sized>(
        &self,
        category: IndexCategory,
        document_id: impl Into<String>,
        partial_fields: &T,
    ) -> Result<(), ClientError> {
        let Client::Ready(ready) = self else {
            return Ok(());
        };
        let target_index = ready.resolver.resolve(category);
        let document_id = document_id.into();
        let fields = match serde_json::to_value(partial_fields) {
            Ok(fields @ Value::Object(_)) => fields,
            Ok(other) => {
                return Err(serialization(
                    "update",
                    &target_index,
                    &document_id,
                    serde_json::Error::custom(format!(
                        "partial update fields must be a JSON object, got {}",
                        json_kind(&other)
                    )),
                ));
            }
            Err(err) => return Err(serialization("update", &target_index, &document_id, err)),
        };
        let body = encode("update", &target_index, &document_id, &json!({ "doc": fields }))?;
        ready.enqueue(WriteOperation::new(target_index, document_id, Action::Update, Some(body)))
    }

    /// ➕ Buffers a scripted append of `values` onto the array field `field_name`.
    ///
    /// No values means no write at all, whatever the field name. Otherwise the field name
    /// ends up inside a script, so it has to pass [`FieldName`] first.
    pub fn append_to_array_field<T: Serialize>(
        &self,
        category: IndexCategory,
        document_id: impl Into<String>,
        field_name: &str,
        values: &[T],
    ) -> Result<(), ClientError> {
        let Client::Ready(ready) = self else {
            return Ok(());
        };
        if values.is_empty() {
            return Ok(());
        }
        let field = FieldName::new(field_name)?;
        let target_index = ready.resolver.resolve(category);
        let document_id = document_id.into();
        let to_append = serde_json::to_value(values)
            .map_err(|err| serialization("append", &target_index, &document_id, err))?;
        let script = json!({
            "script": {
                "source": format!("ctx._source.{field}.addAll(params.toAppend)"),
                "params": { "toAppend": to_append },
            }
        });
        let body = encode("append", &target_index, &document_id, &script)?;
        ready.enqueue(WriteOperation::new(
            target_index,
            document_id,
            Action::ScriptedAppend,
            Some(body),
        ))
    }

    /// 🗑️ Buffers a delete.
    pub fn delete_document(&self, category: IndexCategory, document_id: impl Into<String>) -> Result<(), ClientError> {
        let Client::Ready(ready) = self else {
            return Ok(());
        };
        let target_index = ready.resolver.resolve(category);
        ready.enqueue(WriteOperation::new(target_index, document_id, Action::Delete, None))
    }

    /// 🎯 Writes one document right now, skipping the buffer, and waits for the verdict.
    ///
    /// `Ok(None)` means the client is disabled. Dropping the future abandons the request.
    pub async fn index_document_synchronous<T: Serialize + ?Sized>(
        &self,
        category: IndexCategory,
        document_id: impl Into<String>,
        document: &T,
    ) -> Result<Option<BulkItemAck>, ClientError> {
        let Client::Ready(ready) = self else {
            return Ok(None);
        };
        let target_index = ready.resolver.resolve(category);
        let document_id = document_id.into();
        let body = encode("index", &target_index, &document_id, document)?;

        match ready.store.index(&target_index, &document_id, body).await {
            Ok(ack) => {
                info!(
                    "✅ ({} : {}) [{}] {}",
                    target_index, document_id, ack.status, ack.result
                );
                Ok(Some(ack))
            }
            Err(cause) => {
                error!("💀 ({} : {}) {:#}", target_index, document_id, cause);
                Err(ClientError::Request {
                    target_index,
                    document_id,
                    cause,
                })
            }
        }
    }

    /// ⏱️ [`Client::index_document_synchronous`] with a deadline.
    pub async fn index_document_synchronous_within<T: Serialize + ?Sized>(
        &self,
        category: IndexCategory,
        document_id: impl Into<String>,
        document: &T,
        deadline: Duration,
    ) -> Result<Option<BulkItemAck>, ClientError> {
        let document_id = document_id.into();
        let attempt = self.index_document_synchronous(category, document_id.clone(), document);
        match tokio::time::timeout(deadline, attempt).await {
            Ok(result) => result,
            Err(_) => {
                let target_index = match self {
                    Client::Ready(ready) => ready.resolver.resolve(category),
                    Client::Disabled => category.to_string(),
                };
                warn!(
                    "⏱️ ({} : {}) gave up after {:?}",
                    target_index, document_id, deadline
                );
                Err(ClientError::DeadlineExceeded {
                    target_index,
                    document_id,
                    deadline,
                })
            }
        }
    }

    /// 🗑️ Flushes what's buffered and waits for every outcome to be reported.
    ///
    /// Other clones stop accepting writes too. Calling it twice is fine.
    pub async fn close(&self) -> Result<(), ClientError> {
        match self {
            Client::Ready(ready) => ready.accumulator.close().await.map_err(ClientError::Close),
            Client::Disabled => Ok(()),
        }
    }
}

impl ReadyClient {
    fn enqueue(&self, operation: WriteOperation) -> Result<(), ClientError> {
        self.accumulator.add(operation).map_err(|err| {
            warn!("⚠️ Write refused at the door: {err}");
            ClientError::from(err)
        })
    }
}

fn encode<T: Serialize + ?Sized>(
    action: &'static str,
    target_index: &str,
    document_id: &str,
    body: &T,
) -> Result<String, ClientError> {
    serde_json::to_string(body).map_err(|err| serialization(action, target_index, document_id, err))
}

fn serialization(
    action: &'static str,
    target_index: &str,
    document_id: &str,
    source: serde_json::Error,
) -> ClientError {
    ClientError::Serialization {
        action,
        target_index: target_index.to_string(),
        document_id: document_id.to_string(),
        source,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
