use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle, session::SessionRegistry};
use crate::services::board::{LogNotifier, ReorderCoordinator};
use crate::services::question_store::QuestionStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    sessions: SessionRegistry,
    board: Arc<ReorderCoordinator>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        store: Arc<dyn QuestionStore>,
    ) -> Self {
        let board = Arc::new(ReorderCoordinator::new(store, Arc::new(LogNotifier)));
        Self {
            inner: Arc::new(InnerState {
                settings,
                db,
                redis,
                sessions: SessionRegistry::new(),
                board,
            }),
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    pub(crate) fn board(&self) -> &Arc<ReorderCoordinator> {
        &self.inner.board
    }

    pub(crate) fn questions(&self) -> &Arc<dyn QuestionStore> {
        self.inner.board.store()
    }
}
