pub mod chapters;
pub mod courses;
pub mod evaluations;
pub mod views;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::auth;
use crate::error::Error;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Enables the dev_login route; see [`crate::config::Config`].
    pub dev_login: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/courses", get(courses::list))
        .route("/api/courses/{id}", get(courses::detail))
        .route("/api/courses/{id}/enroll", post(courses::enroll))
        .route("/api/chapters/{id}", get(chapters::detail))
        .route("/api/chapters/{id}/progress", post(chapters::progress))
        .route("/api/evaluations/{course_id}", get(evaluations::questions))
        .route("/api/evaluations/{course_id}/submit", post(evaluations::submit))
        .route("/api/auth/dev_login", post(dev_login))
        .with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevLoginRequest {
    pub learner_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Development stand-in for the external identity provider.
#[utoipa::path(post, path = "/api/auth/dev_login",
    responses((status = 200, body = TokenResponse), (status = 401)))]
pub async fn dev_login(
    State(state): State<AppState>,
    Json(req): Json<DevLoginRequest>,
) -> Result<Json<TokenResponse>, Error> {
    if !state.dev_login {
        return Err(Error::Unauthorized);
    }
    let token = auth::issue_token(&req.learner_id, time::Duration::days(5))?;
    Ok(Json(TokenResponse { token }))
}
