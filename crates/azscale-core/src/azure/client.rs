//! Azure Resource Manager REST client
//!
//! Covers the handful of endpoints the scaling commands need: reading a
//! plan or pool, listing capabilities, and issuing the update.

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use url::Url;

use crate::error::ProviderError;
use crate::normalize::FieldSource;
use crate::progress::{ProgressCallback, poll_operation};
use crate::provider::{
    AccessToken, CapabilityQuery, CapabilityScope, OperationHandle, ProviderResult, ResourceReader,
    ResourceRef, ResourceWriter, TokenCredential, WaitOptions,
};

/// API version for `Microsoft.Web/serverfarms`
pub const WEB_API_VERSION: &str = "2022-03-01";

/// API version for `Microsoft.Sql` elastic pools and capabilities
pub const SQL_API_VERSION: &str = "2021-11-01";

/// Token scope for the management plane
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// User agent string for azscale HTTP requests
const AZSCALE_USER_AGENT: &str = concat!("azscale/", env!("CARGO_PKG_VERSION"));

/// Refresh cached tokens this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Upper bound on `nextLink` hops for a single listing
const MAX_PAGES: usize = 200;

/// Authenticated client for one subscription
#[derive(Clone)]
pub struct AzureClient {
    http: reqwest::Client,
    endpoint: Url,
    subscription_id: String,
    credential: Arc<dyn TokenCredential>,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl AzureClient {
    /// Create a client for `subscription_id` against `endpoint`
    pub fn new(
        endpoint: &str,
        subscription_id: impl Into<String>,
        credential: Arc<dyn TokenCredential>,
    ) -> ProviderResult<Self> {
        let endpoint = Url::parse(endpoint.trim()).map_err(|e| {
            ProviderError::Connection(format!("invalid management endpoint '{}': {}", endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(ProviderError::Connection(format!(
                "invalid management endpoint '{}'",
                endpoint
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent(AZSCALE_USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            subscription_id: subscription_id.into(),
            credential,
            token: Arc::new(Mutex::new(None)),
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    /// Full URL of a resource, including its API version
    pub fn resource_url(&self, resource: &ResourceRef) -> Url {
        match resource {
            ResourceRef::AppServicePlan {
                resource_group,
                name,
            } => self.url(
                &[
                    "subscriptions",
                    &self.subscription_id,
                    "resourceGroups",
                    resource_group,
                    "providers",
                    "Microsoft.Web",
                    "serverfarms",
                    name,
                ],
                &[("api-version", WEB_API_VERSION)],
            ),
            ResourceRef::ElasticPool {
                resource_group,
                server,
                pool,
            } => self.url(
                &[
                    "subscriptions",
                    &self.subscription_id,
                    "resourceGroups",
                    resource_group,
                    "providers",
                    "Microsoft.Sql",
                    "servers",
                    server,
                    "elasticPools",
                    pool,
                ],
                &[("api-version", SQL_API_VERSION)],
            ),
        }
    }

    fn capability_url(&self, scope: &CapabilityScope) -> Url {
        match scope {
            CapabilityScope::PlanSkus {
                resource_group,
                name,
            } => self.url(
                &[
                    "subscriptions",
                    &self.subscription_id,
                    "resourceGroups",
                    resource_group,
                    "providers",
                    "Microsoft.Web",
                    "serverfarms",
                    name,
                    "skus",
                ],
                &[("api-version", WEB_API_VERSION)],
            ),
            CapabilityScope::SqlLocation { location, include } => self.url(
                &[
                    "subscriptions",
                    &self.subscription_id,
                    "providers",
                    "Microsoft.Sql",
                    "locations",
                    location,
                    "capabilities",
                ],
                &[("include", include), ("api-version", SQL_API_VERSION)],
            ),
        }
    }

    async fn bearer(&self) -> ProviderResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && !token.expires_within(TOKEN_REFRESH_MARGIN)
        {
            return Ok(token.token.clone());
        }

        debug!("Requesting management token via {}", self.credential.name());
        let token = self.credential.get_token(MANAGEMENT_SCOPE).await?;
        let bearer = token.token.clone();
        *cached = Some(token);
        Ok(bearer)
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> ProviderResult<Response> {
        let bearer = self.bearer().await?;
        debug!("{} {}", method, url);
        if let Some(body) = body {
            trace!("Request body: {}", body);
        }

        let mut request = self.http.request(method, url).bearer_auth(bearer);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        check_status(response).await
    }

    async fn get_json(&self, url: Url) -> ProviderResult<Value> {
        let response = self.send(Method::GET, url, None).await?;
        read_body(response).await
    }

    /// GET an absolute URL (operation status, `Location`)
    ///
    /// Returns `None` while the endpoint answers `202 Accepted`.
    pub async fn get_url(&self, url: &str) -> ProviderResult<Option<Value>> {
        let url = Url::parse(url)
            .map_err(|e| ProviderError::InvalidResponse(format!("bad status URL '{}': {}", url, e)))?;
        let response = self.send(Method::GET, url, None).await?;
        if response.status() == StatusCode::ACCEPTED {
            return Ok(None);
        }
        read_body(response).await.map(Some)
    }

    /// GET a listing and follow every `nextLink`, returning one envelope
    async fn get_paged(&self, url: Url) -> ProviderResult<Value> {
        let mut items = Vec::new();
        let mut next = Some(url);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(ProviderError::InvalidResponse(format!(
                    "listing exceeded {} pages",
                    MAX_PAGES
                )));
            }

            let page = self.get_json(url).await?;
            match page.get_any(&["value"]) {
                Some(Value::Array(values)) => items.extend(values),
                _ if pages == 1 => return Ok(page),
                _ => {}
            }

            next = match page.get_str(&["nextLink"]) {
                Some(link) => Some(Url::parse(&link).map_err(|e| {
                    ProviderError::InvalidResponse(format!("bad nextLink '{}': {}", link, e))
                })?),
                None => None,
            };
        }

        debug!("Listing returned {} item(s) over {} page(s)", items.len(), pages);
        Ok(json!({ "value": items }))
    }
}

async fn check_status(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = arm_error_message(&text, status);
    Err(match status.as_u16() {
        404 => ProviderError::NotFound { message },
        401 | 403 => ProviderError::Unauthorized { message },
        code => ProviderError::Http {
            status: code,
            message,
        },
    })
}

/// Extract `error.message` (or `error.code`) from an ARM error body
fn arm_error_message(text: &str, status: StatusCode) -> String {
    let parsed: Option<Value> = serde_json::from_str(text).ok();
    let from_body = parsed.as_ref().and_then(|body| {
        let error = body.nested(&["error"]);
        let code = error.get_str(&["code"]);
        error
            .get_str(&["message"])
            .or_else(|| body.get_str(&["message"]))
            .map(|message| match code.as_deref() {
                Some(code) => format!("({}) {}", code, message),
                None => message,
            })
            .or(code)
    });

    from_body.unwrap_or_else(|| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            status.to_string()
        } else {
            trimmed.to_string()
        }
    })
}

async fn read_body(response: Response) -> ProviderResult<Value> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

fn header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl ResourceReader for AzureClient {
    async fn get(&self, resource: &ResourceRef) -> ProviderResult<Value> {
        self.get_json(self.resource_url(resource)).await
    }
}

#[async_trait]
impl CapabilityQuery for AzureClient {
    async fn list_capabilities(&self, scope: &CapabilityScope) -> ProviderResult<Value> {
        let url = self.capability_url(scope);
        match scope {
            CapabilityScope::PlanSkus { .. } => self.get_paged(url).await,
            CapabilityScope::SqlLocation { .. } => self.get_json(url).await,
        }
    }
}

#[async_trait]
impl ResourceWriter for AzureClient {
    async fn begin_update(
        &self,
        resource: &ResourceRef,
        body: &Value,
    ) -> ProviderResult<OperationHandle> {
        // Plans are replaced wholesale; pools accept a partial document
        let method = match resource {
            ResourceRef::AppServicePlan { .. } => Method::PUT,
            ResourceRef::ElasticPool { .. } => Method::PATCH,
        };

        let response = self
            .send(method, self.resource_url(resource), Some(body))
            .await?;
        let status = response.status();
        let async_operation_url = header(&response, "azure-asyncoperation");
        let location_url = header(&response, "location");

        debug!(
            "Update accepted with {} (async-operation: {:?}, location: {:?})",
            status, async_operation_url, location_url
        );

        if async_operation_url.is_none() && location_url.is_none() && status != StatusCode::ACCEPTED
        {
            return Ok(OperationHandle::completed(resource.clone()));
        }

        Ok(OperationHandle {
            resource: resource.clone(),
            async_operation_url,
            location_url,
            completed: false,
        })
    }

    async fn wait_for_completion(
        &self,
        handle: &OperationHandle,
        options: &WaitOptions,
        on_progress: Option<ProgressCallback>,
    ) -> ProviderResult<Value> {
        poll_operation(self, handle, options, on_progress).await
    }
}
