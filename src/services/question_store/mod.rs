//! Narrow contract between the question board and the backing store.
//!
//! The board consumes two things: a live subscription that yields the whole
//! collection on every remote change, and an all-or-nothing multi-record
//! update. Question CRUD goes through the same trait so every write lands in
//! the subscription stream.

mod postgres;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::db::types::DifficultyLevel;
use crate::services::board::QuestionKind;

pub(crate) use postgres::PgQuestionStore;

/// Collection name plus ordering key, as the subscription contract names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CollectionQuery {
    pub(crate) collection: &'static str,
    pub(crate) order_by: &'static str,
}

pub(crate) const QUESTIONS_BY_ORDER: CollectionQuery =
    CollectionQuery { collection: "questions", order_by: "order" };

/// One record of a snapshot: id plus its field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Document {
    pub(crate) id: String,
    pub(crate) fields: serde_json::Map<String, serde_json::Value>,
}

/// A single `(record id, field, value)` write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldUpdate {
    pub(crate) id: String,
    pub(crate) field: String,
    pub(crate) value: serde_json::Value,
}

#[derive(Debug, Clone)]
pub(crate) struct NewQuestion {
    pub(crate) text: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) active: bool,
    pub(crate) kind: QuestionKind,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct QuestionPatch {
    pub(crate) text: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) difficulty: Option<DifficultyLevel>,
    pub(crate) active: Option<bool>,
    pub(crate) kind: Option<QuestionKind>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub(crate) enum StoreError {
    #[error("backing store unavailable: {0}")]
    Transport(String),
    #[error("permission denied by backing store: {0}")]
    PermissionDenied(String),
    #[error("record {0} not found")]
    NotFound(String),
    #[error("unsupported {0}")]
    Unsupported(String),
    #[error("malformed document {id}: {reason}")]
    Decode { id: String, reason: String },
}

/// Live feed of collection snapshots. Dropping it stops the feed.
pub(crate) struct Subscription {
    receiver: mpsc::Receiver<Vec<Document>>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(receiver: mpsc::Receiver<Vec<Document>>, task: JoinHandle<()>) -> Self {
        Self { receiver, task }
    }

    /// Next snapshot; `None` once the underlying feed has ended.
    pub(crate) async fn next(&mut self) -> Option<Vec<Document>> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
pub(crate) trait QuestionStore: Send + Sync {
    /// Delivers the current collection first, then again after every change.
    async fn subscribe(&self, query: CollectionQuery) -> Result<Subscription, StoreError>;

    /// Applies every update or none of them.
    async fn apply_batch(&self, updates: Vec<FieldUpdate>) -> Result<(), StoreError>;

    async fn create_question(&self, question: NewQuestion) -> Result<Document, StoreError>;

    async fn update_question(
        &self,
        id: &str,
        patch: QuestionPatch,
    ) -> Result<Document, StoreError>;

    async fn delete_question(&self, id: &str) -> Result<(), StoreError>;
}

pub(super) fn ensure_supported(query: CollectionQuery) -> Result<(), StoreError> {
    if query == QUESTIONS_BY_ORDER {
        Ok(())
    } else {
        Err(StoreError::Unsupported(format!(
            "query on {} ordered by {}",
            query.collection, query.order_by
        )))
    }
}

/// Validates an `order` value from a batch entry.
pub(super) fn order_value(update: &FieldUpdate) -> Result<Option<i32>, StoreError> {
    if update.field != "order" {
        return Err(StoreError::Unsupported(format!("field {} on {}", update.field, update.id)));
    }

    match &update.value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(number) => number
            .as_i64()
            .and_then(|value| i32::try_from(value).ok())
            .map(Some)
            .ok_or_else(|| {
                StoreError::Unsupported(format!("order value {number} on {}", update.id))
            }),
        other => Err(StoreError::Unsupported(format!("order value {other} on {}", update.id))),
    }
}
