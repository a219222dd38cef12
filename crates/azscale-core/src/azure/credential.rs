//! Management API token sources
//!
//! Tokens come from a static environment variable, a service principal in
//! the environment, or the local Azure CLI login. [`default_credential`]
//! chains them in the order the operator prefers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{AccessToken, ProviderResult, TokenCredential};

/// Default Microsoft Entra authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

pub const ENV_ACCESS_TOKEN: &str = "AZURE_ACCESS_TOKEN";
pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const ENV_AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn unauthorized(message: impl Into<String>) -> ProviderError {
    ProviderError::Unauthorized {
        message: message.into(),
    }
}

/// Pre-acquired bearer token
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read `AZURE_ACCESS_TOKEN`, if set
    pub fn from_env() -> Option<Self> {
        env_value(ENV_ACCESS_TOKEN).map(Self::new)
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    fn name(&self) -> &'static str {
        "StaticTokenCredential"
    }

    async fn get_token(&self, _scope: &str) -> ProviderResult<AccessToken> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_on: None,
        })
    }
}

/// Service principal (client credentials) from the environment
///
/// Variables are read on every request so a missing secret is reported
/// when the chain reaches this source.
pub struct EnvironmentCredential {
    http: reqwest::Client,
    authority_host: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl EnvironmentCredential {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            authority_host: None,
        }
    }

    /// Use a specific authority instead of `AZURE_AUTHORITY_HOST`
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = Some(host.into());
        self
    }
}

impl Default for EnvironmentCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        "EnvironmentCredential"
    }

    async fn get_token(&self, scope: &str) -> ProviderResult<AccessToken> {
        let (Some(tenant), Some(client_id), Some(secret)) = (
            env_value(ENV_TENANT_ID),
            env_value(ENV_CLIENT_ID),
            env_value(ENV_CLIENT_SECRET),
        ) else {
            return Err(unauthorized(format!(
                "{}, {} and {} must be set",
                ENV_TENANT_ID, ENV_CLIENT_ID, ENV_CLIENT_SECRET
            )));
        };

        let authority = self
            .authority_host
            .clone()
            .or_else(|| env_value(ENV_AUTHORITY_HOST))
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            authority.trim_end_matches('/'),
            tenant
        );

        debug!("Requesting client-credentials token from {}", url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(unauthorized(format!(
                "token request failed with {}: {}",
                status,
                text.trim()
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(AccessToken {
            token: token.access_token,
            expires_on: token
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }
}

/// Token from the local `az login` session
pub struct AzureCliCredential {
    program: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        Self {
            program: program.to_string(),
        }
    }

    /// Use a different executable (tests, wrappers)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "AzureCliCredential"
    }

    async fn get_token(&self, scope: &str) -> ProviderResult<AccessToken> {
        let output = Command::new(&self.program)
            .args(["account", "get-access-token", "--scope", scope, "--output", "json"])
            .output()
            .await
            .map_err(|e| unauthorized(format!("could not run '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unauthorized(format!(
                "'az account get-access-token' failed: {}",
                stderr.trim()
            )));
        }

        parse_cli_token(&output.stdout)
    }
}

fn parse_cli_token(stdout: &[u8]) -> ProviderResult<AccessToken> {
    let token: CliToken = serde_json::from_slice(stdout)?;
    Ok(AccessToken {
        token: token.access_token,
        expires_on: token
            .expires_on
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
    })
}

/// Tries each source in order and returns the first token
pub struct ChainedCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedCredential {
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl TokenCredential for ChainedCredential {
    fn name(&self) -> &'static str {
        "ChainedCredential"
    }

    async fn get_token(&self, scope: &str) -> ProviderResult<AccessToken> {
        let mut failures = Vec::new();
        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    debug!("Authenticated with {}", source.name());
                    return Ok(token);
                }
                Err(e) => {
                    debug!("{} unavailable: {}", source.name(), e);
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }
        Err(unauthorized(if failures.is_empty() {
            "no credential sources configured".to_string()
        } else {
            failures.join("; ")
        }))
    }
}

/// The credential chain used by the CLI
///
/// A static token always goes first. `prefer_az_cli` puts the Azure CLI
/// ahead of the environment service principal.
pub fn default_credential(prefer_az_cli: bool) -> Arc<dyn TokenCredential> {
    let mut sources: Vec<Arc<dyn TokenCredential>> = Vec::new();
    if let Some(token) = StaticTokenCredential::from_env() {
        sources.push(Arc::new(token));
    }

    let cli: Arc<dyn TokenCredential> = Arc::new(AzureCliCredential::new());
    let environment: Arc<dyn TokenCredential> = Arc::new(EnvironmentCredential::new());
    if prefer_az_cli {
        sources.extend([cli, environment]);
    } else {
        sources.extend([environment, cli]);
    }

    Arc::new(ChainedCredential::new(sources))
}
