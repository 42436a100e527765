use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{QuizResult, QuizSession};
use crate::db::types::QuizStatus;
use crate::services::board::QuestionRecord;

const SESSION_COLUMNS: &str = "\
    id, title, launched_by, assignee_id, questions, status, created_at, completed_at";

const RESULT_COLUMNS: &str = "\
    session_id, score, max_score, needs_review, outcomes, answers, submitted_at";

pub(crate) struct CreateSession<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub launched_by: &'a str,
    pub assignee_id: &'a str,
    pub questions: &'a [QuestionRecord],
    pub created_at: PrimitiveDateTime,
}

/// Inserts one session per assignee, all or none.
pub(crate) async fn create_sessions(
    pool: &PgPool,
    sessions: &[CreateSession<'_>],
) -> Result<Vec<QuizSession>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut created = Vec::with_capacity(sessions.len());

    for params in sessions {
        let session = sqlx::query_as::<_, QuizSession>(&format!(
            "INSERT INTO quiz_sessions (
                id, title, launched_by, assignee_id, questions, status, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7)
            RETURNING {SESSION_COLUMNS}"
        ))
        .bind(params.id)
        .bind(params.title)
        .bind(params.launched_by)
        .bind(params.assignee_id)
        .bind(Json(params.questions))
        .bind(QuizStatus::Pending)
        .bind(params.created_at)
        .fetch_one(&mut *tx)
        .await?;
        created.push(session);
    }

    tx.commit().await?;
    Ok(created)
}

pub(crate) async fn find_session(
    pool: &PgPool,
    id: &str,
) -> Result<Option<QuizSession>, sqlx::Error> {
    sqlx::query_as::<_, QuizSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM quiz_sessions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_pending_for_assignee(
    pool: &PgPool,
    assignee_id: &str,
) -> Result<Vec<QuizSession>, sqlx::Error> {
    sqlx::query_as::<_, QuizSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM quiz_sessions
         WHERE assignee_id = $1 AND status = $2
         ORDER BY created_at DESC"
    ))
    .bind(assignee_id)
    .bind(QuizStatus::Pending)
    .fetch_all(pool)
    .await
}

pub(crate) struct CompleteSession<'a> {
    pub session_id: &'a str,
    pub score: f64,
    pub max_score: f64,
    pub needs_review: bool,
    pub outcomes: serde_json::Value,
    pub answers: serde_json::Value,
    pub submitted_at: PrimitiveDateTime,
}

/// Stores the result and completes the session. `None` when the session was
/// no longer pending, in which case nothing is written.
pub(crate) async fn complete_with_result(
    pool: &PgPool,
    params: CompleteSession<'_>,
) -> Result<Option<QuizResult>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE quiz_sessions SET status = $1, completed_at = $2
         WHERE id = $3 AND status = $4",
    )
    .bind(QuizStatus::Completed)
    .bind(params.submitted_at)
    .bind(params.session_id)
    .bind(QuizStatus::Pending)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Ok(None);
    }

    let result = sqlx::query_as::<_, QuizResult>(&format!(
        "INSERT INTO quiz_results (
            session_id, score, max_score, needs_review, outcomes, answers, submitted_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7)
        RETURNING {RESULT_COLUMNS}"
    ))
    .bind(params.session_id)
    .bind(params.score)
    .bind(params.max_score)
    .bind(params.needs_review)
    .bind(Json(params.outcomes))
    .bind(Json(params.answers))
    .bind(params.submitted_at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(result))
}

pub(crate) async fn find_result(
    pool: &PgPool,
    session_id: &str,
) -> Result<Option<QuizResult>, sqlx::Error> {
    sqlx::query_as::<_, QuizResult>(&format!(
        "SELECT {RESULT_COLUMNS} FROM quiz_results WHERE session_id = $1"
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await
}
