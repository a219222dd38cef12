//! Interfaces to the cloud management service
//!
//! The resolver and applier only ever talk to these traits. [`AzureClient`]
//! implements them against Azure Resource Manager; tests substitute
//! in-memory fakes.
//!
//! [`AzureClient`]: crate::azure::AzureClient

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::error::ProviderError;
use crate::progress::ProgressCallback;

/// Result type for provider calls
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// A resource this tool can scale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    AppServicePlan {
        resource_group: String,
        name: String,
    },
    ElasticPool {
        resource_group: String,
        server: String,
        pool: String,
    },
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::AppServicePlan {
                resource_group,
                name,
            } => write!(f, "App Service Plan '{}' in RG '{}'", name, resource_group),
            ResourceRef::ElasticPool {
                resource_group,
                server,
                pool,
            } => write!(
                f,
                "elastic pool '{}' on server '{}' in RG '{}'",
                pool, server, resource_group
            ),
        }
    }
}

/// `include` filter for the SQL location capabilities query
pub const ELASTIC_POOL_EDITIONS: &str = "supportedElasticPoolEditions";

/// What to ask the capability endpoint for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityScope {
    /// Selectable SKUs for an existing plan
    PlanSkus {
        resource_group: String,
        name: String,
    },
    /// SQL capabilities for a region, filtered to one family
    SqlLocation { location: String, include: String },
}

impl CapabilityScope {
    pub fn elastic_pool_editions(location: impl Into<String>) -> Self {
        CapabilityScope::SqlLocation {
            location: location.into(),
            include: ELASTIC_POOL_EDITIONS.to_string(),
        }
    }
}

/// Bearer token for the management API
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// True when the token expires within `margin`
    pub fn expires_within(&self, margin: Duration) -> bool {
        match self.expires_on {
            Some(expiry) => {
                let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::zero());
                Utc::now() + margin >= expiry
            }
            None => false,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Source of management API tokens
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name used in logs and error messages
    fn name(&self) -> &'static str;

    async fn get_token(&self, scope: &str) -> ProviderResult<AccessToken>;
}

/// Reads a resource's current document
#[async_trait]
pub trait ResourceReader: Send + Sync {
    async fn get(&self, resource: &ResourceRef) -> ProviderResult<Value>;
}

/// Queries the provider for valid scale configurations
#[async_trait]
pub trait CapabilityQuery: Send + Sync {
    /// Returns the raw capability tree; paged results are fully materialized
    async fn list_capabilities(&self, scope: &CapabilityScope) -> ProviderResult<Value>;
}

/// Handle to an accepted update
#[derive(Debug, Clone, PartialEq)]
pub struct OperationHandle {
    pub resource: ResourceRef,
    /// `Azure-AsyncOperation` status URL
    pub async_operation_url: Option<String>,
    /// `Location` URL
    pub location_url: Option<String>,
    /// The provider finished the update synchronously
    pub completed: bool,
}

impl OperationHandle {
    /// Handle for an update that completed within the initial request
    pub fn completed(resource: ResourceRef) -> Self {
        Self {
            resource,
            async_operation_url: None,
            location_url: None,
            completed: true,
        }
    }
}

/// How long and how often to poll a long-running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1800),
            interval: Duration::from_secs(10),
        }
    }
}

/// Issues updates and waits for them
#[async_trait]
pub trait ResourceWriter: Send + Sync {
    /// Send the update; returns as soon as the provider accepts it
    async fn begin_update(
        &self,
        resource: &ResourceRef,
        body: &Value,
    ) -> ProviderResult<OperationHandle>;

    /// Block until the provider reports completion, returning the updated
    /// resource document
    async fn wait_for_completion(
        &self,
        handle: &OperationHandle,
        options: &WaitOptions,
        on_progress: Option<ProgressCallback>,
    ) -> ProviderResult<Value>;
}
