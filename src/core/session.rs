use std::collections::HashMap;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::User;
use crate::db::types::UserRole;

/// Who is signed in on a given session. Created on login, removed on logout.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SessionContext {
    pub(crate) session_id: String,
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) issued_at: OffsetDateTime,
    pub(crate) expires_at: OffsetDateTime,
}

impl SessionContext {
    pub(crate) fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    pub(crate) fn has_role(&self, roles: &[UserRole]) -> bool {
        roles.contains(&self.role)
    }
}

#[derive(Clone, Default)]
pub(crate) struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionContext>>>,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn open(&self, user: &User, ttl: Duration) -> SessionContext {
        let now = OffsetDateTime::now_utc();
        let context = SessionContext {
            session_id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            issued_at: now,
            expires_at: now + ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| !session.is_expired(now));
        sessions.insert(context.session_id.clone(), context.clone());

        tracing::debug!(user_id = %context.user_id, active = sessions.len(), "Session opened");
        context
    }

    /// Live session for `session_id`; expired sessions are dropped on sight.
    pub(crate) async fn get(&self, session_id: &str) -> Option<SessionContext> {
        let now = OffsetDateTime::now_utc();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                Some(session) if !session.is_expired(now) => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        self.sessions.write().await.remove(session_id);
        None
    }

    pub(crate) async fn close(&self, session_id: &str) -> Option<SessionContext> {
        let removed = self.sessions.write().await.remove(session_id);
        if let Some(session) = &removed {
            tracing::debug!(user_id = %session.user_id, "Session closed");
        }
        removed
    }

    pub(crate) async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
