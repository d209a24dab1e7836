//! Credential lifecycle flows. Each flow talks to the issuer, normalizes its
//! answer, and manages the local session as a side effect. The outcome tells
//! the caller where to send the user next.

pub mod issuer;

pub use issuer::IssuerClient;

use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::gate::{LANDING_PATH, SIGN_IN_PATH};
use crate::session::{ClientContext, Session, SessionManager, SessionUser};
use crate::token::Role;

/// Issuer rejections whose text actually reports success. Some issuer
/// builds return these with a failure status; match them verbatim and
/// treat the flow as succeeded.
pub const REGISTER_SUCCESS_MARKERS: &[&str] = &[
    "User registered successfully",
    "Verification code sent",
    "Verification code sent to your email",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    /// The issuer answered and said no. The text is safe to show the user.
    #[error("{0}")]
    Rejected(String),
    #[error("authentication service unreachable")]
    Unreachable,
    #[error("authentication service returned an unexpected response")]
    Malformed,
}

/// Where a finished flow leaves the user.
#[derive(Debug, Default)]
pub struct FlowOutcome {
    pub navigate_to: Option<String>,
    pub message: Option<String>,
    pub session: Option<Session>,
}

/// Lightweight email sanity check before a flow reaches the issuer.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// One-time codes are six digits.
#[must_use]
pub fn valid_otp_code(code: &str) -> bool {
    Regex::new(r"^[0-9]{6}$").is_ok_and(|re| re.is_match(code))
}

/// Does a rejection text report success in disguise?
#[must_use]
pub fn is_disguised_success(text: &str) -> bool {
    REGISTER_SUCCESS_MARKERS.iter().any(|marker| *marker == text)
}

pub struct CredentialFlows {
    issuer: IssuerClient,
    sessions: Arc<SessionManager>,
}

impl CredentialFlows {
    #[must_use]
    pub fn new(issuer: IssuerClient, sessions: Arc<SessionManager>) -> Self {
        Self { issuer, sessions }
    }

    /// Sign in. An unverified account is sent to the OTP form without a
    /// session; a verified one gets a session and lands in the app.
    #[instrument(skip(self, password, client))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
        client: ClientContext,
    ) -> Result<FlowOutcome, FlowError> {
        if !valid_email(email) {
            return Err(FlowError::Rejected("Invalid email address".to_string()));
        }

        let response = self.issuer.login(email, password).await?;

        if !response.verified {
            return Ok(FlowOutcome {
                navigate_to: Some("/otp".to_string()),
                message: Some("Please verify your email to continue".to_string()),
                session: None,
            });
        }

        let user = SessionUser {
            id: response.user.id,
            email: response.user.email,
            role: response.user.role,
        };
        let session = self
            .sessions
            .create(&user, &response.token, remember_me, client)
            .map_err(|err| {
                warn!(%err, "session could not be persisted");
                FlowError::Rejected("Could not establish a session".to_string())
            })?;
        info!(session_id = %session.id, "signed in");

        Ok(FlowOutcome {
            navigate_to: Some(LANDING_PATH.to_string()),
            message: None,
            session: Some(session),
        })
    }

    /// Create an account. Never establishes a session; verification comes
    /// first.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<FlowOutcome, FlowError> {
        if !valid_email(email) {
            return Err(FlowError::Rejected("Invalid email address".to_string()));
        }

        let message = match self.issuer.register(name, email, password, role).await {
            Ok(response) => response.message,
            Err(FlowError::Rejected(text)) if is_disguised_success(&text) => text,
            Err(err) => return Err(err),
        };

        Ok(FlowOutcome {
            navigate_to: Some("/otp".to_string()),
            message: Some(message),
            session: None,
        })
    }

    #[instrument(skip(self))]
    pub async fn send_otp(&self, email: &str) -> Result<FlowOutcome, FlowError> {
        let response = self.issuer.send_otp(email).await?;
        Ok(FlowOutcome {
            navigate_to: None,
            message: Some(response.message),
            session: None,
        })
    }

    /// Confirm the one-time code. Some issuers sign the user in on the spot
    /// by returning a token; otherwise they go back to the sign-in form.
    #[instrument(skip(self, code, client))]
    pub async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        client: ClientContext,
    ) -> Result<FlowOutcome, FlowError> {
        if !valid_otp_code(code) {
            return Err(FlowError::Rejected("Invalid verification code".to_string()));
        }

        let response = self.issuer.verify_otp(email, code).await?;

        if let (Some(token), Some(user)) = (response.token, response.user) {
            let user = SessionUser {
                id: user.id,
                email: user.email,
                role: user.role,
            };
            let session = self
                .sessions
                .create(&user, &token, false, client)
                .map_err(|err| {
                    warn!(%err, "session could not be persisted");
                    FlowError::Rejected("Could not establish a session".to_string())
                })?;
            return Ok(FlowOutcome {
                navigate_to: Some(LANDING_PATH.to_string()),
                message: None,
                session: Some(session),
            });
        }

        Ok(FlowOutcome {
            navigate_to: Some(SIGN_IN_PATH.to_string()),
            message: Some("Email verified, please sign in".to_string()),
            session: None,
        })
    }

    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<FlowOutcome, FlowError> {
        if !valid_email(email) {
            return Err(FlowError::Rejected("Invalid email address".to_string()));
        }
        let response = self.issuer.forgot_password(email).await?;
        Ok(FlowOutcome {
            navigate_to: None,
            message: Some(response.message),
            session: None,
        })
    }

    #[instrument(skip(self, code, password))]
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        password: &str,
    ) -> Result<FlowOutcome, FlowError> {
        if !valid_otp_code(code) {
            return Err(FlowError::Rejected("Invalid verification code".to_string()));
        }

        let response = self.issuer.reset_password(email, code, password).await?;
        Ok(FlowOutcome {
            navigate_to: Some(SIGN_IN_PATH.to_string()),
            message: Some(response.message),
            session: None,
        })
    }

    /// Sign out. The local session is cleared no matter what the issuer
    /// says; revocation upstream is best effort.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> FlowOutcome {
        let token = self.sessions.get().map(|session| session.token);
        self.sessions.clear();

        if let Some(token) = token {
            if let Err(err) = self.issuer.logout(&token).await {
                warn!(%err, "issuer-side revocation failed, session cleared locally");
            }
        }

        FlowOutcome {
            navigate_to: Some(SIGN_IN_PATH.to_string()),
            message: None,
            session: None,
        }
    }
}
