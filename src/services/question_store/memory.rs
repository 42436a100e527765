use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use super::{
    ensure_supported, order_value, CollectionQuery, Document, FieldUpdate, NewQuestion,
    QuestionPatch, QuestionStore, StoreError, Subscription,
};

/// In-process store with the same all-or-nothing batch semantics as Postgres,
/// plus failure injection for the rollback paths.
#[derive(Clone)]
pub(crate) struct MemoryQuestionStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<MemoryState>,
    changes: broadcast::Sender<()>,
}

#[derive(Default)]
struct MemoryState {
    documents: Vec<Document>,
    failures: VecDeque<StoreError>,
    batches: Vec<Vec<FieldUpdate>>,
}

impl MemoryQuestionStore {
    pub(crate) fn new() -> Self {
        Self::with_documents(Vec::new())
    }

    pub(crate) fn with_documents(documents: Vec<Document>) -> Self {
        let (changes, _) = broadcast::channel(16);
        let state = MemoryState { documents, ..MemoryState::default() };
        Self { inner: Arc::new(Inner { state: Mutex::new(state), changes }) }
    }

    /// The next `apply_batch` fails with `error` and writes nothing.
    pub(crate) fn fail_next_batch(&self, error: StoreError) {
        self.lock().failures.push_back(error);
    }

    pub(crate) fn documents(&self) -> Vec<Document> {
        self.lock().documents.clone()
    }

    pub(crate) fn committed_batches(&self) -> Vec<Vec<FieldUpdate>> {
        self.lock().batches.clone()
    }

    /// Simulates a write by another client.
    pub(crate) fn set_field(&self, id: &str, field: &str, value: serde_json::Value) {
        {
            let mut state = self.lock();
            if let Some(document) = state.documents.iter_mut().find(|doc| doc.id == id) {
                document.fields.insert(field.to_string(), value);
            }
        }
        self.publish();
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self) {
        let _ = self.inner.changes.send(());
    }
}

#[async_trait]
impl QuestionStore for MemoryQuestionStore {
    async fn subscribe(&self, query: CollectionQuery) -> Result<Subscription, StoreError> {
        ensure_supported(query)?;

        let mut changes = self.inner.changes.subscribe();
        let (sender, receiver) = mpsc::channel(8);
        sender
            .send(self.documents())
            .await
            .map_err(|_| StoreError::Transport("subscriber dropped".to_string()))?;

        let store = self.clone();
        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if sender.send(store.documents()).await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(receiver, task))
    }

    async fn apply_batch(&self, updates: Vec<FieldUpdate>) -> Result<(), StoreError> {
        {
            let mut state = self.lock();
            if let Some(error) = state.failures.pop_front() {
                return Err(error);
            }

            for update in &updates {
                order_value(update)?;
                if !state.documents.iter().any(|doc| doc.id == update.id) {
                    return Err(StoreError::NotFound(update.id.clone()));
                }
            }

            for update in &updates {
                if let Some(document) = state.documents.iter_mut().find(|doc| doc.id == update.id)
                {
                    document.fields.insert(update.field.clone(), update.value.clone());
                }
            }
            state.batches.push(updates);
        }

        self.publish();
        Ok(())
    }

    async fn create_question(&self, question: NewQuestion) -> Result<Document, StoreError> {
        let document = {
            let mut state = self.lock();
            let next_order = state
                .documents
                .iter()
                .filter_map(|doc| doc.fields.get("order").and_then(|value| value.as_i64()))
                .max()
                .map_or(0, |max| max + 1);

            let mut fields = serde_json::Map::new();
            fields.insert("order".to_string(), json!(next_order));
            fields.insert("text".to_string(), json!(question.text));
            fields.insert("category".to_string(), json!(question.category));
            fields.insert("difficulty".to_string(), json!(question.difficulty));
            fields.insert("active".to_string(), json!(question.active));
            fields.insert("kind".to_string(), json!(question.kind));

            let document = Document { id: Uuid::new_v4().to_string(), fields };
            state.documents.push(document.clone());
            document
        };

        self.publish();
        Ok(document)
    }

    async fn update_question(
        &self,
        id: &str,
        patch: QuestionPatch,
    ) -> Result<Document, StoreError> {
        let document = {
            let mut state = self.lock();
            let document = state
                .documents
                .iter_mut()
                .find(|doc| doc.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

            if let Some(text) = patch.text {
                document.fields.insert("text".to_string(), json!(text));
            }
            if let Some(category) = patch.category {
                document.fields.insert("category".to_string(), json!(category));
            }
            if let Some(difficulty) = patch.difficulty {
                document.fields.insert("difficulty".to_string(), json!(difficulty));
            }
            if let Some(active) = patch.active {
                document.fields.insert("active".to_string(), json!(active));
            }
            if let Some(kind) = patch.kind {
                document.fields.insert("kind".to_string(), json!(kind));
            }
            document.clone()
        };

        self.publish();
        Ok(document)
    }

    async fn delete_question(&self, id: &str) -> Result<(), StoreError> {
        {
            let mut state = self.lock();
            let before = state.documents.len();
            state.documents.retain(|doc| doc.id != id);
            if state.documents.len() == before {
                return Err(StoreError::NotFound(id.to_string()));
            }
        }

        self.publish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::DifficultyLevel;
    use crate::services::board::QuestionKind;
    use crate::services::question_store::QUESTIONS_BY_ORDER;
    use crate::test_support::question_document;

    fn order_update(id: &str, order: i64) -> FieldUpdate {
        FieldUpdate { id: id.to_string(), field: "order".to_string(), value: json!(order) }
    }

    #[tokio::test]
    async fn batch_with_unknown_id_writes_nothing() {
        let store = MemoryQuestionStore::with_documents(vec![
            question_document("a", Some(0)),
            question_document("b", Some(1)),
        ]);

        let err = store
            .apply_batch(vec![order_update("a", 5), order_update("missing", 6)])
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::NotFound("missing".to_string()));
        assert_eq!(store.documents()[0].fields["order"], json!(0));
        assert!(store.committed_batches().is_empty());
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let store = MemoryQuestionStore::with_documents(vec![question_document("a", Some(0))]);
        store.fail_next_batch(StoreError::Transport("offline".to_string()));

        assert!(store.apply_batch(vec![order_update("a", 3)]).await.is_err());
        store.apply_batch(vec![order_update("a", 3)]).await.expect("second batch");
        assert_eq!(store.documents()[0].fields["order"], json!(3));
    }

    #[tokio::test]
    async fn subscription_emits_initial_and_changed_snapshots() {
        let store = MemoryQuestionStore::new();
        let mut subscription = store.subscribe(QUESTIONS_BY_ORDER).await.expect("subscribe");

        let initial = subscription.next().await.expect("initial snapshot");
        assert!(initial.is_empty());

        store
            .create_question(NewQuestion {
                text: "Name a prime".to_string(),
                category: "math".to_string(),
                difficulty: DifficultyLevel::Easy,
                active: true,
                kind: QuestionKind::OpenEnded { reference_answer: Some("2".to_string()) },
            })
            .await
            .expect("create");

        let next = subscription.next().await.expect("change snapshot");
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].fields["order"], json!(0));
    }
}
