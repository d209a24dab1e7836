use axum::{
    extract::OriginalUri,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::flows::FlowError;
use crate::gate::SESSION_COOKIE_NAME;
use crate::session::{ClientContext, Session};

pub mod auth;
pub mod health;
pub mod session;

/// Client metadata off the request, best effort. The proxy chain sets
/// `x-forwarded-for`; the first hop is the client.
#[must_use]
pub fn client_context(headers: &HeaderMap) -> ClientContext {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    ClientContext {
        user_agent,
        address,
    }
}

/// `Set-Cookie` value carrying the session credential.
#[must_use]
pub fn session_cookie(session: &Session) -> String {
    format!(
        "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.token,
        session.ttl_seconds()
    )
}

/// `Set-Cookie` value that drops the session cookie.
#[must_use]
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Stand-in for the fronted application. Requests only reach it after the
/// admission middleware let them through.
pub async fn app_placeholder(OriginalUri(uri): OriginalUri) -> Response {
    Json(json!({ "path": uri.path() })).into_response()
}

/// One JSON shape for every flow failure.
pub fn flow_error_response(err: &FlowError) -> Response {
    let status = match err {
        FlowError::Rejected(_) => StatusCode::BAD_REQUEST,
        FlowError::Unreachable | FlowError::Malformed => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::{Duration, TimeZone, Utc};

    fn session(remember_me: bool) -> Session {
        let created = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Session {
            id: "01J0000000000000000000000".to_string(),
            user_id: "usr_01".to_string(),
            token: "tok".to_string(),
            created_at: created,
            expires_at: created + Duration::hours(24),
            last_activity: created,
            remember_me,
            client: ClientContext::default(),
        }
    }

    #[test]
    fn cookie_lifetime_follows_duration_class() {
        assert!(session_cookie(&session(false)).contains("Max-Age=86400"));
        assert!(session_cookie(&session(true)).contains("Max-Age=2592000"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn client_context_reads_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 test"),
        );
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );

        let context = client_context(&headers);
        assert_eq!(context.user_agent.as_deref(), Some("Mozilla/5.0 test"));
        assert_eq!(context.address.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn client_context_tolerates_missing_headers() {
        let context = client_context(&HeaderMap::new());
        assert_eq!(context, ClientContext::default());
    }
}
