use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;

use crate::core::metrics;
use crate::services::question_store::{Document, FieldUpdate, QuestionStore, StoreError};

use super::notifier::{Notice, Notifier};
use super::view::{hydrate, is_permutation, order_updates, restamp};
use super::QuestionRecord;

const SAVED_MESSAGE: &str = "Question order saved";
const RESTORED_MESSAGE: &str = "Could not save the new question order; the previous order was restored";
const SUPERSEDED_MESSAGE: &str =
    "Could not save the new question order; showing the latest saved order";

#[derive(Debug, Error)]
pub(crate) enum ReorderError {
    #[error("a reorder is already in progress")]
    InProgress,
    #[error("reorder must list every displayed question exactly once")]
    NotAPermutation,
    #[error("too many questions to rank")]
    TooManyQuestions,
    #[error("failed to persist question order: {source}")]
    Persist {
        #[source]
        source: StoreError,
        rolled_back: bool,
    },
}

impl ReorderError {
    pub(crate) fn user_message(&self) -> &'static str {
        match self {
            Self::InProgress => "Another reorder is still being saved",
            Self::NotAPermutation => "Reorder must list every displayed question exactly once",
            Self::TooManyQuestions => "Too many questions to reorder",
            Self::Persist { rolled_back: true, .. } => RESTORED_MESSAGE,
            Self::Persist { rolled_back: false, .. } => SUPERSEDED_MESSAGE,
        }
    }
}

/// Board contents as served to clients.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct BoardSnapshot {
    pub(crate) items: Vec<QuestionRecord>,
    pub(crate) reordering: bool,
    pub(crate) generation: u64,
}

/// Optimistic view already applied; the batched write has not been issued yet.
#[must_use = "a pending reorder keeps the board in the reordering phase until persisted"]
#[derive(Debug)]
pub(crate) struct PendingReorder {
    updates: Vec<FieldUpdate>,
    generation: u64,
}

enum Phase {
    Idle,
    Reordering { previous: Vec<QuestionRecord> },
}

struct BoardState {
    view: Vec<QuestionRecord>,
    /// Bumped on every replacement of `view`.
    generation: u64,
    phase: Phase,
}

/// Owns the displayed question sequence and its reorder protocol.
///
/// The view is replaced wholesale by subscription snapshots and by optimistic
/// reorders. A reorder is `Idle -> Reordering -> Idle`: the new order is shown
/// before the write is issued, and a failed write restores the exact previous
/// sequence unless a snapshot has replaced the view in the meantime.
pub(crate) struct ReorderCoordinator {
    store: Arc<dyn QuestionStore>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<BoardState>,
}

impl ReorderCoordinator {
    pub(crate) fn new(store: Arc<dyn QuestionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            state: Mutex::new(BoardState { view: Vec::new(), generation: 0, phase: Phase::Idle }),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn QuestionStore> {
        &self.store
    }

    pub(crate) fn view(&self) -> Vec<QuestionRecord> {
        self.lock().view.clone()
    }

    pub(crate) fn is_reordering(&self) -> bool {
        matches!(self.lock().phase, Phase::Reordering { .. })
    }

    pub(crate) fn board(&self) -> BoardSnapshot {
        let state = self.lock();
        BoardSnapshot {
            items: state.view.clone(),
            reordering: matches!(state.phase, Phase::Reordering { .. }),
            generation: state.generation,
        }
    }

    /// Replaces the view with a server-driven snapshot. Returns the record count.
    pub(crate) fn apply_snapshot(&self, documents: &[Document]) -> usize {
        let records = hydrate(documents);
        let count = records.len();

        let mut state = self.lock();
        if matches!(state.phase, Phase::Reordering { .. }) {
            tracing::debug!("Snapshot superseded an in-flight reorder");
        }
        state.view = records;
        state.generation += 1;
        drop(state);

        metrics::record_snapshot(count);
        count
    }

    /// Applies `next` to the view immediately and enters the reordering phase.
    pub(crate) fn begin(&self, next: Vec<QuestionRecord>) -> Result<PendingReorder, ReorderError> {
        let mut state = self.lock();

        if matches!(state.phase, Phase::Reordering { .. }) {
            return Err(ReorderError::InProgress);
        }
        if !is_permutation(&state.view, &next) {
            return Err(ReorderError::NotAPermutation);
        }

        let optimistic = restamp(next).ok_or(ReorderError::TooManyQuestions)?;
        let updates = order_updates(&optimistic);
        let previous = std::mem::replace(&mut state.view, optimistic);
        state.generation += 1;
        state.phase = Phase::Reordering { previous };

        Ok(PendingReorder { updates, generation: state.generation })
    }

    /// Issues the batched write and resolves the reordering phase.
    pub(crate) async fn persist(&self, pending: PendingReorder) -> Result<Notice, ReorderError> {
        let PendingReorder { updates, generation } = pending;
        let count = updates.len();

        let result = self.store.apply_batch(updates).await;

        let mut state = self.lock();
        let previous = match std::mem::replace(&mut state.phase, Phase::Idle) {
            Phase::Reordering { previous } => previous,
            Phase::Idle => Vec::new(),
        };

        match result {
            Ok(()) => {
                drop(state);
                tracing::info!(questions = count, "Question order persisted");
                metrics::record_reorder("committed");

                let notice = Notice::success(SAVED_MESSAGE);
                self.notifier.notify(&notice);
                Ok(notice)
            }
            Err(source) => {
                let rolled_back = state.generation == generation;
                if rolled_back {
                    state.view = previous;
                    state.generation += 1;
                }
                drop(state);

                tracing::error!(error = %source, rolled_back, "Failed to persist question order");
                metrics::record_reorder(if rolled_back { "rolled_back" } else { "superseded" });

                let error = ReorderError::Persist { source, rolled_back };
                self.notifier.notify(&Notice::error(error.user_message()));
                Err(error)
            }
        }
    }

    /// Full reorder. The write is detached so it completes even if the caller is dropped.
    pub(crate) async fn reorder(
        self: &Arc<Self>,
        next: Vec<QuestionRecord>,
    ) -> Result<Notice, ReorderError> {
        let pending = self.begin(next)?;
        let coordinator = Arc::clone(self);

        match tokio::spawn(async move { coordinator.persist(pending).await }).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, "Reorder task did not complete");
                Err(ReorderError::Persist {
                    source: StoreError::Transport(err.to_string()),
                    rolled_back: false,
                })
            }
        }
    }

    /// Resolves `ids` against the current view and reorders to match.
    pub(crate) async fn reorder_ids(
        self: &Arc<Self>,
        ids: &[String],
    ) -> Result<Notice, ReorderError> {
        let next = {
            let state = self.lock();
            ids.iter()
                .map(|id| state.view.iter().find(|record| &record.id == id).cloned())
                .collect::<Option<Vec<_>>>()
                .ok_or(ReorderError::NotAPermutation)?
        };

        self.reorder(next).await
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
