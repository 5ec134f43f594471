//! Registration and login endpoints

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::user::{User, UserId};

pub fn create_auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub id: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Safe-to-expose view of a user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().as_str().to_string(),
            email: user.email().to_string(),
            created_at: user.created_at().to_rfc3339(),
        }
    }
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    debug!(user = %request.id, "registering user");
    let id = UserId::new(request.id)?;
    let user = state
        .users
        .register(id, &request.email, &request.password)
        .await?;
    Ok(Json(UserResponse::from(&user)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let id = UserId::new(request.id)?;
    let token = state
        .users
        .authenticate(&id, &request.password)
        .await
        .map_err(|_| ApiError::unauthorized("invalid credentials"))?;
    let user = state.users.get(&id).await?;
    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(&user),
    }))
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.get(&user_id).await?;
    Ok(Json(UserResponse::from(&user)))
}
