use axum::{
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    name: String,
    version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = [Health])
    ),
    tag = "health"
)]
pub async fn health() -> impl IntoResponse {
    let health = Health {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let mut headers = HeaderMap::new();
    match format!("{}:{}", health.name, health.version).parse::<HeaderValue>() {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => {
            error!("Failed to parse X-App header: {}", err);
        }
    }

    (headers, Json(health))
}
