use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use crate::session::SessionManager;

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Current session", body = crate::session::SessionInfo),
        (status = 204, description = "No valid session")
    ),
    tag = "auth"
)]
pub async fn session(sessions: Extension<Arc<SessionManager>>) -> impl IntoResponse {
    match sessions.info() {
        Some(info) => Json(info).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
