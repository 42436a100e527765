use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::session::SessionContext;
use crate::core::{security, state::AppState};
use crate::db::types::UserRole;

/// The signed-in session behind the bearer token.
pub(crate) struct CurrentSession(pub(crate) SessionContext);
pub(crate) struct CurrentAdmin(pub(crate) SessionContext);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let session = app_state
            .sessions()
            .get(&claims.sid)
            .await
            .ok_or(ApiError::Unauthorized("Session has ended"))?;

        if session.user_id != claims.sub {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentSession(session))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;
        require_role(&session, &[UserRole::Admin])?;
        Ok(CurrentAdmin(session))
    }
}

pub(crate) fn require_role(session: &SessionContext, roles: &[UserRole]) -> Result<(), ApiError> {
    if session.has_role(roles) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not enough permissions"))
    }
}
