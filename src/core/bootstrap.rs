use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;

/// Makes sure the configured first admin exists, is active and has the configured password.
pub(crate) async fn ensure_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_PASSWORD not configured; skipping admin creation");
        return Ok(());
    }

    let username = &admin.first_admin_username;
    let now = primitive_now_utc();

    if let Some(user) = repositories::users::find_by_username(state.db(), username).await? {
        let verified = security::verify_password(&admin.first_admin_password, &user.hashed_password)
            .unwrap_or(false);

        let hashed_password = if verified {
            None
        } else {
            Some(security::hash_password(&admin.first_admin_password)?)
        };
        let role = (user.role != UserRole::Admin).then_some(UserRole::Admin);
        let is_active = (!user.is_active).then_some(true);

        if hashed_password.is_none() && role.is_none() && is_active.is_none() {
            tracing::info!("Default admin already up to date");
            return Ok(());
        }

        repositories::users::update(
            state.db(),
            &user.id,
            repositories::users::UpdateUser { role, is_active, hashed_password, updated_at: now },
        )
        .await?;

        tracing::info!("Updated default admin {username}");
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_admin_password)?;
    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username,
            hashed_password,
            full_name: "Administrator",
            role: UserRole::Admin,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    tracing::info!("Created default admin {username}");
    Ok(())
}
