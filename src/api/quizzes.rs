use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{require_role, CurrentSession};
use crate::api::validation::{unique_ids, validate_payload};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::QuizSession;
use crate::db::types::{QuizStatus, UserRole};
use crate::repositories;
use crate::schemas::quiz::{QuizCreate, QuizResultResponse, QuizSessionResponse, QuizSubmit};
use crate::services::board::QuestionRecord;
use crate::services::scoring;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(launch_quiz))
        .route("/mine", get(my_quizzes))
        .route("/:quiz_id", get(get_quiz))
        .route("/:quiz_id/submit", post(submit_quiz))
}

async fn launch_quiz(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(payload): Json<QuizCreate>,
) -> Result<(StatusCode, Json<Vec<QuizSessionResponse>>), ApiError> {
    require_role(&session, &[UserRole::Admin, UserRole::Manager])?;
    validate_payload(&payload)?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be blank".to_string()));
    }

    let assignee_ids = unique_ids("assignee_ids", &payload.assignee_ids)?;
    let questions = select_questions(
        &state.board().view(),
        payload.question_ids.as_deref(),
        state.settings().board().max_questions_per_quiz,
    )?;

    let assignees =
        repositories::users::find_active_with_role(state.db(), &assignee_ids, UserRole::Employee)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load assignees"))?;
    if assignees.len() != assignee_ids.len() {
        let found: HashSet<&str> = assignees.iter().map(|user| user.id.as_str()).collect();
        let missing: Vec<&str> =
            assignee_ids.iter().map(String::as_str).filter(|id| !found.contains(id)).collect();
        return Err(ApiError::BadRequest(format!(
            "Assignees must be active employees: {}",
            missing.join(", ")
        )));
    }

    let now = primitive_now_utc();
    let session_ids: Vec<String> =
        assignee_ids.iter().map(|_| Uuid::new_v4().to_string()).collect();
    let params: Vec<repositories::quizzes::CreateSession<'_>> = assignee_ids
        .iter()
        .zip(&session_ids)
        .map(|(assignee_id, id)| repositories::quizzes::CreateSession {
            id,
            title,
            launched_by: &session.user_id,
            assignee_id,
            questions: &questions,
            created_at: now,
        })
        .collect();

    let created = repositories::quizzes::create_sessions(state.db(), &params)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create quiz sessions"))?;

    tracing::info!(
        launched_by = %session.user_id,
        sessions = created.len(),
        questions = questions.len(),
        action = "quiz_launch",
        "Quiz launched"
    );

    let response = created
        .into_iter()
        .map(|quiz| QuizSessionResponse::from_db(quiz, true))
        .collect();
    Ok((StatusCode::CREATED, Json(response)))
}

async fn my_quizzes(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<QuizSessionResponse>>, ApiError> {
    require_role(&session, &[UserRole::Employee])?;

    let quizzes = repositories::quizzes::list_pending_for_assignee(state.db(), &session.user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list quizzes"))?;

    Ok(Json(quizzes.into_iter().map(|quiz| QuizSessionResponse::from_db(quiz, false)).collect()))
}

async fn get_quiz(
    Path(quiz_id): Path<String>,
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<QuizSessionResponse>, ApiError> {
    let quiz = fetch_quiz(&state, &quiz_id).await?;

    let reviewer = session.has_role(&[UserRole::Admin, UserRole::Manager]);
    if !reviewer && quiz.assignee_id != session.user_id {
        return Err(ApiError::Forbidden("Not enough permissions"));
    }

    let result = if quiz.status == QuizStatus::Completed {
        repositories::quizzes::find_result(state.db(), &quiz.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load quiz result"))?
    } else {
        None
    };

    Ok(Json(QuizSessionResponse::from_db(quiz, reviewer).with_result(result)))
}

async fn submit_quiz(
    Path(quiz_id): Path<String>,
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(payload): Json<QuizSubmit>,
) -> Result<Json<QuizResultResponse>, ApiError> {
    let quiz = fetch_quiz(&state, &quiz_id).await?;

    if quiz.assignee_id != session.user_id {
        return Err(ApiError::Forbidden("Only the assignee can submit this quiz"));
    }
    if quiz.status == QuizStatus::Completed {
        return Err(ApiError::Conflict("Quiz already submitted".to_string()));
    }

    let questions = &quiz.questions.0;
    let known: HashSet<&str> = questions.iter().map(|question| question.id.as_str()).collect();
    if let Some(unknown) = payload.answers.keys().find(|id| !known.contains(id.as_str())) {
        return Err(ApiError::BadRequest(format!("Answer for unknown question {unknown}")));
    }

    let sheet = scoring::score(questions, &payload.answers);
    let outcomes = serde_json::to_value(&sheet.outcomes)
        .map_err(|e| ApiError::internal(e, "Failed to encode quiz outcomes"))?;
    let answers = serde_json::to_value(&payload.answers)
        .map_err(|e| ApiError::internal(e, "Failed to encode quiz answers"))?;

    let result = repositories::quizzes::complete_with_result(
        state.db(),
        repositories::quizzes::CompleteSession {
            session_id: &quiz.id,
            score: sheet.score,
            max_score: sheet.max_score,
            needs_review: sheet.needs_review,
            outcomes,
            answers,
            submitted_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store quiz result"))?
    .ok_or_else(|| ApiError::Conflict("Quiz already submitted".to_string()))?;

    tracing::info!(
        quiz_id = %quiz.id,
        user_id = %session.user_id,
        score = sheet.score,
        max_score = sheet.max_score,
        needs_review = sheet.needs_review,
        "Quiz submitted"
    );

    Ok(Json(QuizResultResponse::from_db(result)))
}

async fn fetch_quiz(state: &AppState, quiz_id: &str) -> Result<QuizSession, ApiError> {
    repositories::quizzes::find_session(state.db(), quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz"))?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))
}

/// Picks the quiz questions from the board: the requested ids in request
/// order, or every active question in board order.
fn select_questions(
    board: &[QuestionRecord],
    question_ids: Option<&[String]>,
    max_questions: usize,
) -> Result<Vec<QuestionRecord>, ApiError> {
    let selected: Vec<QuestionRecord> = match question_ids {
        None => board.iter().filter(|question| question.active).cloned().collect(),
        Some(ids) => {
            let ids = unique_ids("question_ids", ids)?;
            let mut selected = Vec::with_capacity(ids.len());
            let mut unknown = Vec::new();
            for id in &ids {
                match board.iter().find(|question| &question.id == id) {
                    Some(question) => selected.push(question.clone()),
                    None => unknown.push(id.as_str()),
                }
            }
            if !unknown.is_empty() {
                return Err(ApiError::BadRequest(format!(
                    "Unknown question ids: {}",
                    unknown.join(", ")
                )));
            }
            selected
        }
    };

    if selected.is_empty() {
        return Err(ApiError::BadRequest("A quiz needs at least one question".to_string()));
    }
    if selected.len() > max_questions {
        return Err(ApiError::BadRequest(format!(
            "A quiz can hold at most {max_questions} questions"
        )));
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::board::{QuestionKind, RecordingNotifier, ReorderCoordinator};
    use crate::services::question_store::memory::MemoryQuestionStore;
    use crate::test_support::{self, question_document};
    use axum::http::Method;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn board() -> Vec<QuestionRecord> {
        let mut inactive = question_document("c", Some(2));
        inactive.fields.insert("active".to_string(), serde_json::json!(false));
        let documents = vec![question_document("a", Some(0)), question_document("b", Some(1)), inactive];

        let coordinator = ReorderCoordinator::new(
            Arc::new(MemoryQuestionStore::new()),
            Arc::new(RecordingNotifier::default()),
        );
        coordinator.apply_snapshot(&documents);
        coordinator.view()
    }

    fn ids(records: &[QuestionRecord]) -> Vec<&str> {
        records.iter().map(|record| record.id.as_str()).collect()
    }

    #[test]
    fn default_selection_is_active_questions_in_board_order() {
        let selected = select_questions(&board(), None, 10).unwrap();
        assert_eq!(ids(&selected), vec!["a", "b"]);
        assert!(matches!(selected[0].kind, QuestionKind::MultipleChoice { .. }));
    }

    #[test]
    fn explicit_selection_keeps_request_order() {
        let requested = vec!["c".to_string(), "a".to_string()];
        let selected = select_questions(&board(), Some(&requested), 10).unwrap();
        assert_eq!(ids(&selected), vec!["c", "a"]);
    }

    #[test]
    fn unknown_duplicate_or_excess_selection_is_rejected() {
        let unknown = vec!["a".to_string(), "zzz".to_string()];
        assert!(matches!(
            select_questions(&board(), Some(&unknown), 10),
            Err(ApiError::BadRequest(message)) if message.contains("zzz")
        ));

        let duplicate = vec!["a".to_string(), "a".to_string()];
        assert!(select_questions(&board(), Some(&duplicate), 10).is_err());

        assert!(select_questions(&board(), None, 1).is_err());
        assert!(select_questions(&[], None, 10).is_err());
    }

    #[tokio::test]
    async fn employees_cannot_launch_quizzes() {
        let ctx = test_support::setup_test_context(vec![question_document("a", Some(0))]).await;
        let token = test_support::session_token(&ctx.state, UserRole::Employee).await;

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/quizzes",
                Some(&token),
                Some(serde_json::json!({"title": "Weekly", "assignee_ids": ["employee-id"]})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn launch_without_assignees_is_rejected() {
        let ctx = test_support::setup_test_context(vec![question_document("a", Some(0))]).await;
        let token = test_support::session_token(&ctx.state, UserRole::Manager).await;

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/quizzes",
                Some(&token),
                Some(serde_json::json!({"title": "Weekly", "assignee_ids": []})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn managers_have_no_personal_quiz_list() {
        let ctx = test_support::setup_test_context(Vec::new()).await;
        let token = test_support::session_token(&ctx.state, UserRole::Manager).await;

        let response = ctx
            .app
            .oneshot(test_support::json_request(Method::GET, "/api/v1/quizzes/mine", Some(&token), None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL"]
    async fn launched_quiz_is_taken_and_scored_once() {
        let ctx = test_support::setup_db_context().await;
        let pool = ctx.state.db();
        let manager = test_support::insert_user(pool, "manager", UserRole::Manager).await;
        let employee = test_support::insert_user(pool, "employee", UserRole::Employee).await;

        let choice = ctx
            .state
            .questions()
            .create_question(crate::services::question_store::NewQuestion {
                text: "Default HTTPS port?".to_string(),
                category: "networking".to_string(),
                difficulty: crate::db::types::DifficultyLevel::Easy,
                active: true,
                kind: QuestionKind::MultipleChoice {
                    options: vec!["443".to_string(), "80".to_string()],
                    correct_option: 0,
                },
            })
            .await
            .expect("create choice");
        let open = ctx
            .state
            .questions()
            .create_question(crate::services::question_store::NewQuestion {
                text: "Capital of France?".to_string(),
                category: "geography".to_string(),
                difficulty: crate::db::types::DifficultyLevel::Easy,
                active: true,
                kind: QuestionKind::OpenEnded { reference_answer: Some("Paris".to_string()) },
            })
            .await
            .expect("create open");
        ctx.state.board().apply_snapshot(&[choice.clone(), open.clone()]);

        let manager_token = test_support::token_for(&ctx.state, &manager).await;
        let employee_token = test_support::token_for(&ctx.state, &employee).await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/quizzes",
                Some(&manager_token),
                Some(serde_json::json!({"title": "Weekly", "assignee_ids": [employee.id.clone()]})),
            ))
            .await
            .expect("launch");
        assert_eq!(response.status(), StatusCode::CREATED);
        let launched = test_support::read_json(response).await;
        let quiz_id = launched[0]["id"].as_str().expect("quiz id").to_string();

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/v1/quizzes/mine",
                Some(&employee_token),
                None,
            ))
            .await
            .expect("mine");
        assert_eq!(response.status(), StatusCode::OK);
        let mine = test_support::read_json(response).await;
        assert_eq!(mine.as_array().map(Vec::len), Some(1));
        assert!(mine[0]["questions"][0]["kind"].get("correct_option").is_none());

        let submit_uri = format!("/api/v1/quizzes/{quiz_id}/submit");
        let mut by_question = serde_json::Map::new();
        by_question.insert(choice.id.clone(), serde_json::json!({"type": "choice", "option": 0}));
        by_question.insert(open.id.clone(), serde_json::json!({"type": "text", "text": "  paris "}));
        let answers = serde_json::json!({ "answers": by_question });

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &submit_uri,
                Some(&employee_token),
                Some(answers.clone()),
            ))
            .await
            .expect("submit");
        assert_eq!(response.status(), StatusCode::OK);
        let result = test_support::read_json(response).await;
        assert_eq!(result["score"], 2.0);
        assert_eq!(result["max_score"], 2.0);
        assert_eq!(result["needs_review"], false);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &submit_uri,
                Some(&employee_token),
                Some(answers),
            ))
            .await
            .expect("second submit");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/quizzes/{quiz_id}"),
                Some(&manager_token),
                None,
            ))
            .await
            .expect("review");
        assert_eq!(response.status(), StatusCode::OK);
        let review = test_support::read_json(response).await;
        assert_eq!(review["status"], "completed");
        assert_eq!(review["result"]["score"], 2.0);
    }
}
