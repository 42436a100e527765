use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::schemas::question::{
    BoardResponse, QuestionCreate, QuestionUpdate, ReorderRequest, ReorderResponse,
};
use crate::services::board::{QuestionRecord, ReorderError};
use crate::services::question_store::StoreError;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_questions).post(create_question))
        .route("/order", put(reorder_questions))
        .route("/:question_id", patch(update_question).delete(delete_question))
}

async fn list_questions(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Json<BoardResponse> {
    Json(state.board().board().into())
}

async fn create_question(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionRecord>), ApiError> {
    payload.check().map_err(ApiError::BadRequest)?;

    let document = state
        .questions()
        .create_question(payload.into_new_question())
        .await
        .map_err(|e| store_error(e, "Failed to create question"))?;
    let record = QuestionRecord::from_document(&document, 0)
        .map_err(|e| ApiError::internal(e, "Failed to decode created question"))?;

    tracing::info!(
        admin_id = %admin.user_id,
        question_id = %record.id,
        action = "question_create",
        "Question created"
    );

    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_question(
    Path(question_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<QuestionUpdate>,
) -> Result<Json<QuestionRecord>, ApiError> {
    payload.check().map_err(ApiError::BadRequest)?;

    let document = state
        .questions()
        .update_question(&question_id, payload.into_patch())
        .await
        .map_err(|e| store_error(e, "Failed to update question"))?;
    let record = QuestionRecord::from_document(&document, 0)
        .map_err(|e| ApiError::internal(e, "Failed to decode updated question"))?;

    tracing::info!(
        admin_id = %admin.user_id,
        question_id = %record.id,
        action = "question_update",
        "Question updated"
    );

    Ok(Json(record))
}

async fn delete_question(
    Path(question_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state
        .questions()
        .delete_question(&question_id)
        .await
        .map_err(|e| store_error(e, "Failed to delete question"))?;

    tracing::info!(
        admin_id = %admin.user_id,
        question_id = %question_id,
        action = "question_delete",
        "Question deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_questions(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<ReorderResponse>, ApiError> {
    let notice = state.board().reorder_ids(&payload.ids).await.map_err(|err| match err {
        ReorderError::InProgress => ApiError::Conflict(err.user_message().to_string()),
        ReorderError::NotAPermutation | ReorderError::TooManyQuestions => {
            ApiError::BadRequest(err.user_message().to_string())
        }
        ReorderError::Persist { .. } => ApiError::BadGateway(err.user_message().to_string()),
    })?;

    tracing::info!(
        admin_id = %admin.user_id,
        questions = payload.ids.len(),
        action = "question_reorder",
        "Questions reordered"
    );

    Ok(Json(ReorderResponse { notice, board: state.board().board().into() }))
}

fn store_error(err: StoreError, context: &str) -> ApiError {
    match err {
        StoreError::NotFound(_) => ApiError::NotFound("Question not found".to_string()),
        StoreError::PermissionDenied(_) | StoreError::Transport(_) => {
            tracing::error!(error = %err, "{context}");
            ApiError::BadGateway(context.to_string())
        }
        StoreError::Unsupported(_) | StoreError::Decode { .. } => ApiError::internal(err, context),
    }
}

#[cfg(test)]
mod tests;
