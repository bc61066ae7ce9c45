use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::extract::ApiJson;
use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{Role, User};
use crate::services;
use crate::services::auth::{self, Claims, RegisterInput};
use crate::state::AppState;

/// Any signed-in user. The role comes from the stored account, not the token.
pub struct CurrentUser(pub Claims);

/// A signed-in admin.
pub struct AdminUser(pub Claims);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

        let mut claims = auth::verify_token(token, &state.config.jwt_secret)?;

        let user = {
            let conn = state.conn()?;
            queries::get_user(&conn, &claims.sub)?
        };
        let user = user.ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;
        claims.role = user.role;

        Ok(CurrentUser(claims))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(claims) = CurrentUser::from_request_parts(parts, state).await?;
        if !claims.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(claims))
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    token: String,
    user: User,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn respond(state: &AppState, user: User) -> AppResult<Json<AuthResponse>> {
    let token = auth::issue_token(&user, &state.config.jwt_secret, state.config.jwt_expiration_hours)?;
    Ok(Json(AuthResponse { token, user }))
}

// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(input): ApiJson<RegisterInput>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let user = auth::new_customer(input, services::now())?;
    let user = {
        let conn = state.conn()?;
        auth::register(&conn, user)?
    };
    Ok((StatusCode::CREATED, respond(&state, user)?))
}

// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let account = {
        let conn = state.conn()?;
        auth::find_account(&conn, &req.email)?
    };
    let user = auth::authenticate(account, &req.password)?;
    respond(&state, user)
}

// POST /api/admin/login
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let account = {
        let conn = state.conn()?;
        auth::find_account(&conn, &req.email)?
    };
    let user = auth::authenticate(account, &req.password)?;
    if user.role != Role::Admin {
        tracing::warn!(user_id = %user.id, "non-admin attempted admin login");
        return Err(AppError::Forbidden("Access denied. Admin only.".to_string()));
    }
    respond(&state, user)
}
