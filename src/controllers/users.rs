use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::{get, post}, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::middleware::AuthUser;
use crate::models::{RegisterRequest, Role, User};
use crate::services::auth::AuthError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// POST /api/users/register
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    if User::find_by_email(&req.email, &state.db).await?.is_some() {
        return Err(ApiError::Conflict("a user with this email already exists".into()));
    }

    let hash = state.credentials.hash_password(&req.password).await?;
    let user = match User::insert(&req, &hash, Role::User, &state.db).await {
        Ok(user) => user,
        // lost a race with a concurrent registration
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::Conflict("a user with this email already exists".into()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!("registered user {} ({})", user.id, user.email);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "user registered", "user": user })),
    ))
}

// POST /api/users/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = User::find_by_email(&req.email, &state.db)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !state.credentials.verify_password(&req.password, &user.password_hash).await? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.credentials.issue_token(&user)?;
    Ok(Json(json!({
        "message": "logged in",
        "token": token,
        "user": user,
    })))
}

// GET /api/users/me
async fn me(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<User>, ApiError> {
    User::find_by_id(user.user_id, &state.db)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", user.user_id)))
}
