use async_trait::async_trait;
use serde_json::json;
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    ensure_supported, order_value, CollectionQuery, Document, FieldUpdate, NewQuestion,
    QuestionPatch, QuestionStore, StoreError, Subscription,
};
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::QuestionRow;

/// Channel the `questions` statement trigger notifies on (see migrations).
const CHANGE_CHANNEL: &str = "question_changes";
const SNAPSHOT_BUFFER: usize = 8;

const COLUMNS: &str = "\
    id, order_index, text, category, difficulty, active, kind, created_at, updated_at";

/// SQLSTATE `insufficient_privilege`.
const PERMISSION_DENIED_CODE: &str = "42501";

#[derive(Clone)]
pub(crate) struct PgQuestionStore {
    pool: PgPool,
}

impl PgQuestionStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(PERMISSION_DENIED_CODE) =>
            {
                StoreError::PermissionDenied(db_err.message().to_string())
            }
            _ => StoreError::Transport(err.to_string()),
        }
    }
}

async fn fetch_documents(pool: &PgPool) -> Result<Vec<Document>, StoreError> {
    let rows = sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {COLUMNS} FROM questions ORDER BY order_index ASC NULLS LAST, created_at ASC, id ASC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_document).collect())
}

fn row_to_document(row: QuestionRow) -> Document {
    let mut fields = serde_json::Map::new();
    fields.insert("order".to_string(), json!(row.order_index));
    fields.insert("text".to_string(), json!(row.text));
    fields.insert("category".to_string(), json!(row.category));
    fields.insert("difficulty".to_string(), json!(row.difficulty));
    fields.insert("active".to_string(), json!(row.active));
    fields.insert("kind".to_string(), row.kind.0);
    fields.insert("created_at".to_string(), json!(format_primitive(row.created_at)));
    fields.insert("updated_at".to_string(), json!(format_primitive(row.updated_at)));

    Document { id: row.id, fields }
}

#[async_trait]
impl QuestionStore for PgQuestionStore {
    async fn subscribe(&self, query: CollectionQuery) -> Result<Subscription, StoreError> {
        ensure_supported(query)?;

        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        // Listen before the first read so no change can slip between the two.
        let initial = fetch_documents(&self.pool).await?;

        let (sender, receiver) = mpsc::channel(SNAPSHOT_BUFFER);
        sender
            .send(initial)
            .await
            .map_err(|_| StoreError::Transport("subscriber dropped".to_string()))?;

        let pool = self.pool.clone();
        let task = tokio::spawn(async move {
            loop {
                // Notifications sent while the connection is down are lost, so a
                // dropped connection ends the feed and the subscriber starts over.
                match listener.try_recv().await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        tracing::warn!("Question change listener lost its connection");
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Question change listener failed");
                        break;
                    }
                }

                let documents = match fetch_documents(&pool).await {
                    Ok(documents) => documents,
                    Err(err) => {
                        tracing::warn!(error = %err, "Failed to refetch questions after change");
                        break;
                    }
                };

                if sender.send(documents).await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(receiver, task))
    }

    async fn apply_batch(&self, updates: Vec<FieldUpdate>) -> Result<(), StoreError> {
        let orders = updates
            .iter()
            .map(|update| order_value(update).map(|order| (update.id.as_str(), order)))
            .collect::<Result<Vec<_>, _>>()?;

        if orders.is_empty() {
            return Ok(());
        }

        let now = primitive_now_utc();
        let mut tx = self.pool.begin().await?;

        for (id, order) in orders {
            let result =
                sqlx::query("UPDATE questions SET order_index = $1, updated_at = $2 WHERE id = $3")
                    .bind(order)
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;

            // Returning early drops `tx`, which rolls the whole batch back.
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_question(&self, question: NewQuestion) -> Result<Document, StoreError> {
        let now = primitive_now_utc();
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "INSERT INTO questions (
                id, order_index, text, category, difficulty, active, kind, created_at, updated_at
            ) VALUES (
                $1, (SELECT COALESCE(MAX(order_index) + 1, 0) FROM questions),
                $2, $3, $4, $5, $6, $7, $8
            )
            RETURNING {COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(question.text)
        .bind(question.category)
        .bind(question.difficulty)
        .bind(question.active)
        .bind(Json(question.kind))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_document(row))
    }

    async fn update_question(
        &self,
        id: &str,
        patch: QuestionPatch,
    ) -> Result<Document, StoreError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "UPDATE questions
             SET text = COALESCE($1, text),
                 category = COALESCE($2, category),
                 difficulty = COALESCE($3, difficulty),
                 active = COALESCE($4, active),
                 kind = COALESCE($5, kind),
                 updated_at = $6
             WHERE id = $7
             RETURNING {COLUMNS}"
        ))
        .bind(patch.text)
        .bind(patch.category)
        .bind(patch.difficulty)
        .bind(patch.active)
        .bind(patch.kind.map(Json))
        .bind(primitive_now_utc())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_document).ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete_question(&self, id: &str) -> Result<(), StoreError> {
        let result =
            sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        Ok(())
    }
}
