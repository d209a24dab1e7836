//! Credential flow endpoints. Thin over `CredentialFlows`: decode the
//! request, hand it to the flow, translate the outcome into JSON plus the
//! session cookie where one was established or destroyed.

use axum::{
    extract::Extension,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{clear_session_cookie, client_context, flow_error_response, session_cookie};
use crate::flows::{CredentialFlows, FlowOutcome};
use crate::token::Role;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default, rename = "rememberMe")]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigate_to: Option<String>,
}

fn outcome_response(outcome: FlowOutcome) -> Response {
    let body = FlowBody {
        message: outcome.message,
        navigate_to: outcome.navigate_to,
    };

    let mut response = Json(body).into_response();
    if let Some(session) = outcome.session {
        if let Ok(cookie) = session_cookie(&session).parse() {
            response.headers_mut().insert(header::SET_COOKIE, cookie);
        }
    }
    response
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in or sent to verification", body = FlowBody),
        (status = 400, description = "Credentials rejected"),
        (status = 502, description = "Issuer unreachable")
    ),
    tag = "auth"
)]
pub async fn login(
    flows: Extension<Arc<CredentialFlows>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Response {
    let client = client_context(&headers);
    match flows
        .login(&request.email, &request.password, request.remember_me, client)
        .await
    {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => flow_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created, verification pending", body = FlowBody),
        (status = 400, description = "Registration rejected"),
        (status = 502, description = "Issuer unreachable")
    ),
    tag = "auth"
)]
pub async fn register(
    flows: Extension<Arc<CredentialFlows>>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    match flows
        .register(&request.name, &request.email, &request.password, request.role)
        .await
    {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => flow_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Verification code sent", body = FlowBody),
        (status = 400, description = "Request rejected"),
        (status = 502, description = "Issuer unreachable")
    ),
    tag = "auth"
)]
pub async fn send_otp(
    flows: Extension<Arc<CredentialFlows>>,
    Json(request): Json<SendOtpRequest>,
) -> Response {
    match flows.send_otp(&request.email).await {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => flow_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code accepted", body = FlowBody),
        (status = 400, description = "Code rejected"),
        (status = 502, description = "Issuer unreachable")
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    flows: Extension<Arc<CredentialFlows>>,
    headers: HeaderMap,
    Json(request): Json<VerifyOtpRequest>,
) -> Response {
    let client = client_context(&headers);
    match flows.verify_otp(&request.email, &request.otp, client).await {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => flow_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset code sent", body = FlowBody),
        (status = 400, description = "Request rejected"),
        (status = 502, description = "Issuer unreachable")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    flows: Extension<Arc<CredentialFlows>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Response {
    match flows.forgot_password(&request.email).await {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => flow_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = FlowBody),
        (status = 400, description = "Reset rejected"),
        (status = 502, description = "Issuer unreachable")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    flows: Extension<Arc<CredentialFlows>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Response {
    match flows
        .reset_password(&request.email, &request.otp, &request.password)
        .await
    {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => flow_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Signed out", body = FlowBody)
    ),
    tag = "auth"
)]
pub async fn logout(flows: Extension<Arc<CredentialFlows>>) -> Response {
    let outcome = flows.logout().await;
    let mut response = outcome_response(outcome);
    if let Ok(cookie) = clear_session_cookie().parse() {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}
