use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{DifficultyLevel, QuizStatus, UserRole};
use crate::services::board::QuestionRecord;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Raw `questions` row; the board only ever sees it as a field map.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct QuestionRow {
    pub(crate) id: String,
    pub(crate) order_index: Option<i32>,
    pub(crate) text: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) active: bool,
    pub(crate) kind: Json<serde_json::Value>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuizSession {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) launched_by: String,
    pub(crate) assignee_id: String,
    pub(crate) questions: Json<Vec<QuestionRecord>>,
    pub(crate) status: QuizStatus,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuizResult {
    pub(crate) session_id: String,
    pub(crate) score: f64,
    pub(crate) max_score: f64,
    pub(crate) needs_review: bool,
    pub(crate) outcomes: Json<serde_json::Value>,
    pub(crate) answers: Json<serde_json::Value>,
    pub(crate) submitted_at: PrimitiveDateTime,
}
