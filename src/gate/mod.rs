//! Per-request admission control. A pure decision function (`admit`) decides
//! what happens to a request given its path and credential, and an axum
//! middleware applies that decision to live traffic.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use url::form_urlencoded;

use crate::routes::{classify, is_auth_entry, RouteClass};
use crate::session::{ActivitySignal, Clock};
use crate::token::TokenVerifier;

pub const SESSION_COOKIE_NAME: &str = "aula_session";
pub const SIGN_IN_PATH: &str = "/sign-in";
pub const LANDING_PATH: &str = "/classroom";

pub const ERROR_AUTH_REQUIRED: &str = "Authentication required";
pub const ERROR_INVALID_TOKEN: &str = "Invalid or expired token";

/// What the gate decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allow,
    RedirectTo(String),
    Reject {
        status: StatusCode,
        error: &'static str,
    },
}

/// Decide admission for `path` given the presented credential, if any.
///
/// API routes answer in JSON and never redirect. App pages redirect to the
/// sign-in form, carrying the original path so the user lands back where
/// they were headed. A credential that fails verification is treated the
/// same as an expired one.
#[must_use]
pub fn admit(
    verifier: &TokenVerifier,
    path: &str,
    credential: Option<&str>,
    now: DateTime<Utc>,
) -> Admission {
    let verified = credential
        .map(|token| verifier.verify(token, now))
        .map(|outcome| outcome.is_ok());

    match classify(path) {
        RouteClass::ProtectedApi => match verified {
            None => Admission::Reject {
                status: StatusCode::UNAUTHORIZED,
                error: ERROR_AUTH_REQUIRED,
            },
            Some(false) => Admission::Reject {
                status: StatusCode::UNAUTHORIZED,
                error: ERROR_INVALID_TOKEN,
            },
            Some(true) => Admission::Allow,
        },

        RouteClass::ProtectedApp => match verified {
            Some(true) => Admission::Allow,
            None => Admission::RedirectTo(sign_in_url(path, false)),
            Some(false) => Admission::RedirectTo(sign_in_url(path, true)),
        },

        RouteClass::Public => {
            // A signed-in user has no business on the sign-in form
            if verified == Some(true) && is_auth_entry(path) {
                Admission::RedirectTo(LANDING_PATH.to_string())
            } else {
                Admission::Allow
            }
        }
    }
}

fn sign_in_url(callback: &str, expired: bool) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("callbackUrl", callback);
    if expired {
        query.append_pair("error", "session-expired");
    }
    format!("{SIGN_IN_PATH}?{}", query.finish())
}

/// Pull the credential off a request: `Authorization: Bearer` wins over the
/// session cookie. An empty value in either place counts as absent.
#[must_use]
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(authorization) = headers.get(header::AUTHORIZATION) {
        if let Ok(value) = authorization.to_str() {
            let token = value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
                .unwrap_or_default()
                .trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in cookies.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        if parts.next() == Some(SESSION_COOKIE_NAME) {
            let value = parts.next().unwrap_or_default().trim();
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }
    }
    None
}

/// Shared state for the admission middleware.
#[derive(Clone)]
pub struct GateState {
    pub verifier: Arc<TokenVerifier>,
    pub clock: Arc<dyn Clock>,
    pub activity: UnboundedSender<ActivitySignal>,
}

/// Middleware applying `admit` to every request before it reaches a handler.
pub async fn admission_layer(
    State(gate): State<GateState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let credential = extract_credential(request.headers());

    match admit(
        &gate.verifier,
        &path,
        credential.as_deref(),
        gate.clock.now(),
    ) {
        Admission::Allow => {
            // Admitted traffic counts as user activity
            let _ = gate.activity.send(ActivitySignal::Interaction);
            next.run(request).await
        }
        Admission::RedirectTo(location) => {
            debug!(%path, %location, "redirecting");
            Redirect::temporary(&location).into_response()
        }
        Admission::Reject { status, error } => {
            debug!(%path, %status, "rejected");
            (status, Json(json!({ "error": error }))).into_response()
        }
    }
}
