//! # Previously, on bdx...
//!
//! 🎬 The cluster was three time zones away and cost money by the hour. The tests wanted
//! something closer. Something cheaper. Something that lived entirely in RAM and vanished
//! the moment you blinked.
//!
//! That something is [`InMemoryStore`]: a document store that applies writes to a
//! `HashMap`, remembers every request it ever received, and can be told to reject specific
//! ids or to fail whole requests, for when a test needs a villain.
//!
//! ⚠️ This is NOT for production. If you're deploying this to prod, please also deploy a
//! therapist. ✅ No network calls. No disk I/O. Just vibes and heap memory. 🦆

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::Value;

use crate::backends::DocumentStore;
use crate::common::{Action, WriteOperation};
use crate::outcomes::{BulkItemAck, BulkItemError, ItemOutcome};

/// 📼 The tape recording of one `_bulk` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBulkCall {
    pub operations: Vec<WriteOperation>,
}

/// 📼 The tape recording of one synchronous index call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedIndexCall {
    pub target_index: String,
    pub document_id: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct InMemoryState {
    bulk_calls: Vec<RecordedBulkCall>,
    index_calls: Vec<RecordedIndexCall>,
    documents: HashMap<(String, String), Value>,
}

/// 🗄️ A document store that never forgets.
///
/// Clone-able so tests can keep a handle after passing one to the client. The `Arc` means
/// everyone shares the same recordings. Communist data, but in a good way.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<tokio::sync::Mutex<InMemoryState>>,
    rejected_ids: HashSet<String>,
    fail_requests: bool,
    unreachable: bool,
    latency: Option<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🚫 Every item with this id comes back as a 400. Picky, but consistent.
    pub fn rejecting(mut self, document_id: impl Into<String>) -> Self {
        self.rejected_ids.insert(document_id.into());
        self
    }

    /// 💥 Every bulk/index request fails as a whole, like a cluster that woke up on the wrong side of the rack.
    pub fn failing_requests(mut self) -> Self {
        self.fail_requests = true;
        self
    }

    /// 🔌 `ping` fails. Construction should refuse to go on.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// 🐢 Every request sleeps this long first. For tests that want a flush to be in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn bulk_calls(&self) -> Vec<RecordedBulkCall> {
        self.state.lock().await.bulk_calls.clone()
    }

    pub async fn index_calls(&self) -> Vec<RecordedIndexCall> {
        self.state.lock().await.index_calls.clone()
    }

    /// 📊 Bulk + synchronous calls, i.e. "how many times did we bother the backend".
    pub async fn total_calls(&self) -> usize {
        let state = self.state.lock().await;
        state.bulk_calls.len() + state.index_calls.len()
    }

    /// 📦 Operations across every recorded bulk call.
    pub async fn bulk_operation_count(&self) -> usize {
        self.state
            .lock()
            .await
            .bulk_calls
            .iter()
            .map(|call| call.operations.len())
            .sum()
    }

    pub async fn document(&self, target_index: &str, document_id: &str) -> Option<Value> {
        self.state
            .lock()
            .await
            .documents
            .get(&(target_index.to_string(), document_id.to_string()))
            .cloned()
    }

    async fn nap(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

/// 🧠 Applies one operation to the fake document table and produces the verdict a real
/// cluster would have given.
fn apply(documents: &mut HashMap<(String, String), Value>, operation: &WriteOperation) -> Result<BulkItemAck, BulkItemError> {
    let key = (
        operation.target_index().to_string(),
        operation.document_id().to_string(),
    );
    let body = operation
        .body()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|err| rejected(400, "mapper_parsing_exception", err.to_string()))?;

    match (operation.action(), body) {
        (Action::Create, Some(document)) => {
            let replaced = documents.insert(key, document).is_some();
            Ok(if replaced { ack(200, "updated") } else { ack(201, "created") })
        }
        (Action::Update, Some(body)) => {
            let existing = documents
                .get_mut(&key)
                .ok_or_else(|| missing(operation.document_id()))?;
            if let (Some(target), Some(Value::Object(partial))) = (existing.as_object_mut(), body.get("doc")) {
                for (field, value) in partial {
                    target.insert(field.clone(), value.clone());
                }
            }
            Ok(ack(200, "updated"))
        }
        (Action::ScriptedAppend, Some(body)) => {
            let existing = documents
                .get_mut(&key)
                .ok_or_else(|| missing(operation.document_id()))?;
            let field = body["script"]["source"]
                .as_str()
                .and_then(|source| source.strip_prefix("ctx._source."))
                .and_then(|rest| rest.split_once(".addAll("))
                .map(|(field, _)| field.to_string())
                .ok_or_else(|| rejected(400, "script_exception", "unrecognized append script".to_string()))?;
            let to_append = body["script"]["params"]["toAppend"]
                .as_array()
                .cloned()
                .unwrap_or_default();
            match existing.get_mut(&field) {
                Some(Value::Array(values)) => {
                    values.extend(to_append);
                    Ok(ack(200, "updated"))
                }
                _ => Err(rejected(
                    400,
                    "illegal_argument_exception",
                    format!("field [{field}] is not an array"),
                )),
            }
        }
        // 🗑️ a real cluster answers a missing delete with a bare 404, no error object.
        (Action::Delete, _) => match documents.remove(&key) {
            Some(_) => Ok(ack(200, "deleted")),
            None => Err(rejected(404, "", "not_found".to_string())),
        },
        (_, None) => Err(rejected(400, "action_request_validation_exception", "body is missing".to_string())),
    }
}

fn ack(status: u16, result: &str) -> BulkItemAck {
    BulkItemAck {
        status,
        result: result.to_string(),
    }
}

fn rejected(status: u16, error_type: &str, reason: String) -> BulkItemError {
    BulkItemError::Rejected {
        status,
        error_type: error_type.to_string(),
        reason,
    }
}

fn missing(document_id: &str) -> BulkItemError {
    rejected(
        404,
        "document_missing_exception",
        format!("[{document_id}]: document missing"),
    )
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        if self.unreachable {
            bail!("💀 The in-memory store is pretending to be unreachable. It's very committed to the bit.");
        }
        Ok(())
    }

    async fn bulk(&self, operations: &[WriteOperation]) -> Result<Vec<ItemOutcome>> {
        self.nap().await;
        // 🔒 Record first, judge second. Even failed requests leave a paper trail.
        let mut state = self.state.lock().await;
        state.bulk_calls.push(RecordedBulkCall {
            operations: operations.to_vec(),
        });
        if self.fail_requests {
            bail!("💀 The in-memory store refused the whole bulk request. Nothing personal. Okay, a little personal.");
        }

        let outcomes = operations
            .iter()
            .map(|operation| {
                if self.rejected_ids.contains(operation.document_id()) {
                    Err(rejected(
                        400,
                        "mapper_parsing_exception",
                        format!("document [{}] was rejected on purpose", operation.document_id()),
                    ))
                } else {
                    apply(&mut state.documents, operation)
                }
            })
            .collect();
        Ok(outcomes)
    }

    async fn index(&self, target_index: &str, document_id: &str, body: String) -> Result<BulkItemAck> {
        self.nap().await;
        let mut state = self.state.lock().await;
        state.index_calls.push(RecordedIndexCall {
            target_index: target_index.to_string(),
            document_id: document_id.to_string(),
            body: body.clone(),
        });
        if self.fail_requests || self.rejected_ids.contains(document_id) {
            bail!("💀 The in-memory store rejected document '{document_id}' in '{target_index}'.");
        }

        let operation = WriteOperation::new(target_index, document_id, Action::Create, Some(body));
        apply(&mut state.documents, &operation)
            .map_err(anyhow::Error::from)
            .context("💀 The in-memory store could not apply a synchronous index")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(id: &str, action: Action, body: Option<Value>) -> WriteOperation {
        WriteOperation::new("t_sessions", id, action, body.map(|b| b.to_string()))
    }

    #[tokio::test]
    async fn the_one_where_the_fake_cluster_plays_every_verb_straight() -> Result<()> {
        let store = InMemoryStore::new();
        let outcomes = store
            .bulk(&[
                op("1", Action::Create, Some(json!({"name": "a", "fields": []}))),
                op("1", Action::Update, Some(json!({"doc": {"name": "b"}}))),
                op(
                    "1",
                    Action::ScriptedAppend,
                    Some(json!({"script": {"source": "ctx._source.fields.addAll(params.toAppend)", "params": {"toAppend": [1, 2]}}})),
                ),
                op("2", Action::Update, Some(json!({"doc": {"x": 1}}))),
                op("3", Action::Delete, None),
            ])
            .await?;

        assert_eq!(outcomes[0], Ok(ack(201, "created")));
        assert_eq!(outcomes[1], Ok(ack(200, "updated")));
        assert_eq!(outcomes[2], Ok(ack(200, "updated")));
        assert!(matches!(outcomes[3], Err(BulkItemError::Rejected { status: 404, .. })));
        assert!(matches!(outcomes[4], Err(BulkItemError::Rejected { status: 404, .. })));
        assert_eq!(
            store.document("t_sessions", "1").await,
            Some(json!({"name": "b", "fields": [1, 2]}))
        );
        assert_eq!(store.bulk_calls().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_villain_rejects_exactly_who_it_said_it_would() -> Result<()> {
        let store = InMemoryStore::new().rejecting("13");
        let outcomes = store
            .bulk(&[
                op("12", Action::Create, Some(json!({}))),
                op("13", Action::Create, Some(json!({}))),
            ])
            .await?;
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1], Err(BulkItemError::Rejected { status: 400, .. })));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_whole_requests_fail_but_still_get_written_down() {
        let store = InMemoryStore::new().failing_requests();
        assert!(store.bulk(&[op("1", Action::Delete, None)]).await.is_err());
        assert!(store.index("t_sessions", "1", "{}".into()).await.is_err());
        assert_eq!(store.total_calls().await, 2);
        assert!(InMemoryStore::new().unreachable().ping().await.is_err());
    }
}
