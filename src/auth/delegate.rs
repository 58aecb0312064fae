use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::BackendConfig;

/// Authenticated principal, as returned by the backend.
///
/// Unknown fields are kept in `extra` so the record round-trips verbatim
/// into provenance metadata on broadcast events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("backend rejected credential (status {0})")]
    Rejected(u16),

    #[error("authentication timed out")]
    Timeout,

    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Credential validation, delegated to the backend service.
///
/// Implementations must not be called while holding any registry lock; the
/// call may suspend for up to the configured auth timeout.
#[async_trait]
pub trait AuthDelegate: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<UserIdentity, AuthError>;
}

/// Production delegate: `POST {base_url}/api/auth {"token": ...}`.
pub struct HttpAuthDelegate {
    client: reqwest::Client,
    auth_url: String,
    auth_timeout: Duration,
}

impl HttpAuthDelegate {
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self {
            client,
            auth_url: format!("{}/api/auth", config.base_url.trim_end_matches('/')),
            auth_timeout: Duration::from_secs(config.auth_timeout),
        })
    }

    async fn post_credential(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let response = self
            .client
            .post(&self.auth_url)
            .json(&json!({ "token": token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected(response.status().as_u16()));
        }

        Ok(response.json::<UserIdentity>().await?)
    }
}

#[async_trait]
impl AuthDelegate for HttpAuthDelegate {
    async fn authenticate(&self, token: &str) -> Result<UserIdentity, AuthError> {
        // The client carries the coarse backend bound; authentication gets a
        // tighter one so a stalled backend cannot pin a connection in the
        // authenticating phase.
        match tokio::time::timeout(self.auth_timeout, self.post_credential(token)).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::Timeout),
        }
    }
}
