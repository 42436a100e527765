use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentSession;
use crate::api::validation::validate_payload;
use crate::core::security;
use crate::core::state::AppState;
use crate::db::models::User;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, SessionResponse, TokenResponse};

/// Max login attempts per username per window.
const AUTH_RATE_LIMIT: u64 = 10;
/// Rate limit window in seconds.
const AUTH_RATE_WINDOW_SECONDS: u64 = 60;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    validate_payload(&payload)?;

    let rate_key = format!("rl:login:{}", payload.username);
    let allowed = state
        .redis()
        .rate_limit(&rate_key, AUTH_RATE_LIMIT, AUTH_RATE_WINDOW_SECONDS)
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many login attempts, try again later"));
    }

    let user = fetch_user_by_username(&state, &payload.username).await?;

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized("Incorrect username or password"))?;

    if !verified {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    let session = state.sessions().open(&user, security::session_ttl(state.settings())).await;
    let token = match security::create_access_token(&session, state.settings()) {
        Ok(token) => token,
        Err(err) => {
            state.sessions().close(&session.session_id).await;
            return Err(ApiError::internal(err, "Failed to create access token"));
        }
    };

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "User signed in");

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        session: SessionResponse::from_context(&session),
    }))
}

async fn logout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> StatusCode {
    state.sessions().close(&session.session_id).await;
    tracing::info!(user_id = %session.user_id, "User signed out");
    StatusCode::NO_CONTENT
}

async fn me(CurrentSession(session): CurrentSession) -> Json<SessionResponse> {
    Json(SessionResponse::from_context(&session))
}

async fn fetch_user_by_username(state: &AppState, username: &str) -> Result<User, ApiError> {
    repositories::users::find_by_username(state.db(), username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("Incorrect username or password"))
}
