//! Bearer-token sources for the sandbox pool.
//!
//! The pool accepts tokens issued for the dynamic-sessions audience. Tokens can
//! be supplied directly or fetched from the Azure CLI; the CLI-backed provider
//! caches the token until shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::errors::ExecutionError;

pub const SANDBOX_AUDIENCE: &str = "https://dynamicsessions.io";

#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - margin > now,
            None => true,
        }
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, ExecutionError>;
}

/// A token supplied up front, e.g. through `SANDBOX_ACCESS_TOKEN`.
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenCredential {
    async fn access_token(&self) -> Result<AccessToken, ExecutionError> {
        if self.token.trim().is_empty() {
            return Err(ExecutionError::Credential(
                "static sandbox token is empty".to_string(),
            ));
        }
        Ok(AccessToken {
            token: self.token.clone(),
            expires_at: None,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzCliToken {
    access_token: String,
    #[serde(rename = "expires_on", default)]
    expires_on: Option<i64>,
}

/// Fetches tokens with `az account get-access-token`.
pub struct AzureCliCredential {
    resource: String,
    refresh_margin: Duration,
    cached: Mutex<Option<AccessToken>>,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self::for_resource(SANDBOX_AUDIENCE)
    }

    pub fn for_resource(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            refresh_margin: Duration::minutes(5),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<AccessToken, ExecutionError> {
        log::debug!("Requesting sandbox token from Azure CLI for {}", self.resource);
        let output = Command::new("az")
            .args([
                "account",
                "get-access-token",
                "--resource",
                &self.resource,
                "--output",
                "json",
            ])
            .output()
            .await
            .map_err(|e| ExecutionError::Credential(format!("failed to run az CLI: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecutionError::Credential(format!(
                "az account get-access-token failed: {}",
                stderr.trim()
            )));
        }

        parse_az_cli_token(&output.stdout)
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_az_cli_token(stdout: &[u8]) -> Result<AccessToken, ExecutionError> {
    let parsed: AzCliToken = serde_json::from_slice(stdout).map_err(|e| {
        ExecutionError::Credential(format!("unexpected az CLI output: {}", e))
    })?;
    let expires_at = parsed
        .expires_on
        .and_then(|secs| DateTime::from_timestamp(secs, 0));
    Ok(AccessToken {
        token: parsed.access_token,
        expires_at,
    })
}

#[async_trait]
impl CredentialProvider for AzureCliCredential {
    async fn access_token(&self) -> Result<AccessToken, ExecutionError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now(), self.refresh_margin) {
                return Ok(token.clone());
            }
        }

        let token = self.fetch().await?;
        *cached = Some(token.clone());
        Ok(token)
    }
}
