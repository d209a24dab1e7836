//! HTTP client for the credential issuer, the upstream service that owns
//! accounts and signs tokens. All calls go through `post_json` so failures
//! normalize the same way everywhere.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::FlowError;
use crate::token::Role;
use crate::APP_USER_AGENT;

/// Account as the issuer reports it.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IssuerUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: IssuerUser,
    /// Issuers older than v2 omit this; treat missing as unverified.
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpResponse {
    pub token: Option<String>,
    pub user: Option<IssuerUser>,
}

#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IssuerClient {
    base_url: String,
    client: reqwest::Client,
}

impl IssuerClient {
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, FlowError> {
        self.post_json(
            "/v1/auth/login",
            &serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<MessageResponse, FlowError> {
        self.post_json(
            "/v1/auth/register",
            &serde_json::json!({
                "name": name,
                "email": email,
                "password": password,
                "role": role,
            }),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn send_otp(&self, email: &str) -> Result<MessageResponse, FlowError> {
        self.post_json("/v1/auth/send-otp", &serde_json::json!({ "email": email }))
            .await
    }

    #[instrument(skip(self, code))]
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<VerifyOtpResponse, FlowError> {
        self.post_json(
            "/v1/auth/verify-otp",
            &serde_json::json!({ "email": email, "otp": code }),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, FlowError> {
        self.post_json(
            "/v1/auth/forgot-password",
            &serde_json::json!({ "email": email }),
        )
        .await
    }

    #[instrument(skip(self, password))]
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        password: &str,
    ) -> Result<MessageResponse, FlowError> {
        self.post_json(
            "/v1/auth/reset-password",
            &serde_json::json!({ "email": email, "otp": code, "password": password }),
        )
        .await
    }

    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &str) -> Result<MessageResponse, FlowError> {
        let url = format!("{}/v1/auth/logout", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| {
                debug!(%err, "issuer unreachable");
                FlowError::Unreachable
            })?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, FlowError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.post(&url).json(body).send().await.map_err(|err| {
            debug!(%err, "issuer unreachable");
            FlowError::Unreachable
        })?;
        Self::decode(response).await
    }

    /// Success bodies decode to the caller's type. Failure bodies carry
    /// either `error` or `message`; whichever is present becomes the
    /// rejection text.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, FlowError> {
        let status = response.status();
        let body = response.text().await.map_err(|_| FlowError::Unreachable)?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|err| {
                debug!(%err, "issuer returned an undecodable body");
                FlowError::Malformed
            });
        }

        let text = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("error")
                    .or_else(|| value.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| default_rejection(status));
        Err(FlowError::Rejected(text))
    }
}

fn default_rejection(status: StatusCode) -> String {
    format!("request failed with status {status}")
}
