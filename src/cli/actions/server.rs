use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::gateway;
use anyhow::{anyhow, Result};
use url::Url;

/// Handle the server action
///
/// # Errors
/// Returns an error if the issuer URL is invalid or the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            issuer_url,
            verification_key,
        } => {
            let issuer = Url::parse(&issuer_url)?;

            if !matches!(issuer.scheme(), "http" | "https") {
                return Err(anyhow!(
                    "unsupported issuer URL scheme: {}",
                    issuer.scheme()
                ));
            }

            let mut globals = GlobalArgs::new(issuer.to_string());

            if let Some(pem) = verification_key {
                globals.set_verification_key(pem);
            }

            gateway::new(port, &globals).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_rejects_bad_issuer_url() {
        let action = Action::Server {
            port: 8080,
            issuer_url: "not a url".to_string(),
            verification_key: None,
        };
        assert!(handle(action).await.is_err());
    }

    #[tokio::test]
    async fn test_handle_rejects_unsupported_scheme() {
        let action = Action::Server {
            port: 8080,
            issuer_url: "ftp://identity.aula.dev".to_string(),
            verification_key: None,
        };
        assert!(handle(action).await.is_err());
    }
}
