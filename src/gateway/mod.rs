//! HTTP front door. Wires the admission middleware, the credential flow
//! endpoints, and the session maintenance tasks into one axum server.

use crate::{
    cli::{globals::GlobalArgs, telemetry},
    flows::{CredentialFlows, IssuerClient},
    gate::{admission_layer, GateState},
    session::{
        activity::{self, ActivitySignal, ActivityTracker},
        tasks, MemoryStore, SessionManager, SystemClock,
    },
    token::TokenVerifier,
};
use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::watch};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;

mod handlers;

use handlers::{auth, health, session};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        session::session,
        auth::login,
        auth::register,
        auth::send_otp,
        auth::verify_otp,
        auth::forgot_password,
        auth::reset_password,
        auth::logout,
    ),
    components(schemas(
        health::Health,
        auth::LoginRequest,
        auth::RegisterRequest,
        auth::SendOtpRequest,
        auth::VerifyOtpRequest,
        auth::ForgotPasswordRequest,
        auth::ResetPasswordRequest,
        auth::FlowBody,
        crate::session::SessionInfo,
        crate::token::Role,
    )),
    tags(
        (name = "auth", description = "Credential lifecycle"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the full application router. Separated from `new` so tests can
/// drive it with `tower::ServiceExt` instead of a socket.
#[must_use]
pub fn router(
    gate: GateState,
    sessions: Arc<SessionManager>,
    flows: Arc<CredentialFlows>,
) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/register", post(auth::register))
        .route("/v1/auth/send-otp", post(auth::send_otp))
        .route("/v1/auth/verify-otp", post(auth::verify_otp))
        .route("/v1/auth/forgot-password", post(auth::forgot_password))
        .route("/v1/auth/reset-password", post(auth::reset_password))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/v1/auth/session", get(session::session))
        // Everything else is the fronted application; the gate decides
        // whether the request reaches it
        .fallback(handlers::app_placeholder)
        .layer(middleware::from_fn_with_state(gate, admission_layer))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(sessions))
                .layer(Extension(flows)),
        )
}

/// Start the server
/// # Errors
/// Returns an error if the server fails to start
pub async fn new(port: u16, globals: &GlobalArgs) -> Result<()> {
    let clock = Arc::new(SystemClock);
    let sessions = Arc::new(SessionManager::new(
        Arc::new(MemoryStore::new()),
        clock.clone(),
    ));
    let verifier = Arc::new(TokenVerifier::new(globals.verification_key_pem.clone()));
    let issuer = IssuerClient::new(&globals.issuer_url)?;
    let flows = Arc::new(CredentialFlows::new(issuer, sessions.clone()));

    let (activity_tx, activity_rx) = activity::channel();
    let tracker = Arc::new(ActivityTracker::new(sessions.clone(), clock.clone()));
    let tracker_handle = tracker.spawn(activity_rx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (sweep_handle, refresh_handle) = tasks::spawn_maintenance(sessions.clone(), shutdown_rx);

    let gate = GateState {
        verifier,
        clock,
        activity: activity_tx.clone(),
    };

    let app = router(gate, sessions, flows);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    // Flush bookkeeping before the tasks go away
    let _ = activity_tx.send(ActivitySignal::Teardown);
    let _ = shutdown_tx.send(true);
    let _ = tracker_handle.await;
    let _ = sweep_handle.await;
    let _ = refresh_handle.await;

    telemetry::shutdown_tracer();

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, request_id)
}

#[cfg(test)]
mod tests {
    #[test]
    fn openapi_document_builds() {
        let doc = super::openapi();
        assert!(doc.paths.paths.contains_key("/health"));
        assert!(doc.paths.paths.contains_key("/v1/auth/login"));
        assert!(doc.paths.paths.contains_key("/v1/auth/session"));
    }
}
