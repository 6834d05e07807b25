use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::auth::TokenSource;
use super::{OperationHandle, PollTarget, ProviderMetadata, ResourceProvider};
use crate::executor::operation::OperationStatus;
use crate::resolver::ApiVersion;
use crate::resource::models::ResourceState;
use crate::tags::TagSet;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
/// API version used for resource-group listing and provider metadata.
pub const DEFAULT_METADATA_API_VERSION: &str = "2021-04-01";

const ASYNC_OPERATION: &str = "azure-asyncoperation";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceListPage {
    #[serde(default)]
    value: Vec<ResourceState>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsyncOperationBody {
    status: String,
    #[serde(default)]
    error: Option<ArmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl std::fmt::Display for ArmErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code.is_empty(), self.message.is_empty()) {
            (false, false) => write!(f, "{}: {}", self.code, self.message),
            (false, true) => f.write_str(&self.code),
            _ => f.write_str(&self.message),
        }
    }
}

/// The update body: the full tag field plus the fields some resource
/// providers require to be echoed back.
#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    location: &'a str,
    tags: &'a TagSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    sku: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    properties: &'a serde_json::Value,
}

/// Azure Resource Manager over HTTPS.
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    metadata_api_version: String,
    tokens: Arc<dyn TokenSource>,
}

impl ArmClient {
    pub fn with_endpoint(endpoint: &str, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            metadata_api_version: DEFAULT_METADATA_API_VERSION.to_string(),
            tokens,
        }
    }

    pub fn with_metadata_api_version(mut self, version: &str) -> Self {
        self.metadata_api_version = version.to_string();
        self
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.tokens.token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let resp = self
            .request(Method::GET, url)
            .await?
            .send()
            .await
            .with_context(|| format!("Failed to {}", what))?;
        let resp = check_status(resp, what).await?;
        resp.json()
            .await
            .with_context(|| format!("Failed to parse response to {}", what))
    }
}

/// Turn a non-success response into an error carrying ARM's message.
async fn check_status(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ArmErrorBody>(&body) {
        Ok(parsed) => bail!("Failed to {} ({}): {}", what, status, parsed.error),
        Err(_) if body.trim().is_empty() => bail!("Failed to {} ({})", what, status),
        Err(_) => bail!("Failed to {} ({}): {}", what, status, body.trim()),
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

/// Map an async-operation status string onto the operation model.
fn parse_async_status(body: AsyncOperationBody) -> OperationStatus {
    match body.status.to_ascii_lowercase().as_str() {
        "succeeded" => OperationStatus::Succeeded,
        "failed" => OperationStatus::Failed(
            body.error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "operation failed".to_string()),
        ),
        "canceled" | "cancelled" => OperationStatus::Canceled,
        _ => OperationStatus::Running,
    }
}

#[async_trait]
impl ResourceProvider for ArmClient {
    async fn list_resource_group(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<ResourceState>> {
        let mut url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/resources?api-version={}",
            self.endpoint, subscription_id, resource_group, self.metadata_api_version
        );
        let mut resources = Vec::new();
        loop {
            let page: ResourceListPage = self
                .get_json(&url, &format!("list resource group '{}'", resource_group))
                .await?;
            resources.extend(page.value);
            match page.next_link {
                Some(next) if !next.is_empty() => url = next,
                _ => break,
            }
        }
        debug!(resource_group, count = resources.len(), "Listed resources");
        Ok(resources)
    }

    async fn get_provider(
        &self,
        subscription_id: &str,
        namespace: &str,
    ) -> Result<Option<ProviderMetadata>> {
        let url = format!(
            "{}/subscriptions/{}/providers/{}?api-version={}",
            self.endpoint, subscription_id, namespace, self.metadata_api_version
        );
        let resp = self
            .request(Method::GET, &url)
            .await?
            .send()
            .await
            .with_context(|| format!("Failed to query provider '{}'", namespace))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp, &format!("query provider '{}'", namespace)).await?;
        let metadata = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse metadata for provider '{}'", namespace))?;
        Ok(Some(metadata))
    }

    async fn begin_update(
        &self,
        resource: &ResourceState,
        api_version: &ApiVersion,
        tags: &TagSet,
    ) -> Result<OperationHandle> {
        let url = format!(
            "{}{}?api-version={}",
            self.endpoint, resource.id, api_version
        );
        let body = UpdateBody {
            location: &resource.location,
            tags,
            sku: resource.sku.as_ref(),
            properties: &resource.properties,
        };

        let resp = self
            .request(Method::PATCH, &url)
            .await?
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to submit update for '{}'", resource.name))?;
        let resp = check_status(resp, &format!("update '{}'", resource.name)).await?;

        let target = match resp.status() {
            StatusCode::ACCEPTED => {
                let headers = resp.headers();
                if let Some(url) = header(headers, ASYNC_OPERATION) {
                    PollTarget::AsyncOperation(url)
                } else if let Some(url) = header(headers, LOCATION.as_str()) {
                    PollTarget::Location(url)
                } else {
                    bail!(
                        "Update for '{}' was accepted without a status URL to poll",
                        resource.name
                    );
                }
            }
            _ => PollTarget::Completed,
        };
        debug!(resource = %resource.id, ?target, "Update submitted");
        Ok(OperationHandle::new(&resource.id, api_version.clone(), target))
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        match &handle.target {
            PollTarget::Completed => Ok(OperationStatus::Succeeded),
            PollTarget::AsyncOperation(url) => {
                let body: AsyncOperationBody =
                    self.get_json(url, "poll operation status").await?;
                Ok(parse_async_status(body))
            }
            PollTarget::Location(url) => {
                let resp = self
                    .request(Method::GET, url)
                    .await?
                    .send()
                    .await
                    .context("Failed to poll operation location")?;
                if let Some(retry) = header(resp.headers(), RETRY_AFTER.as_str()) {
                    debug!(retry_after = %retry, "Provider suggested a retry delay");
                }
                match resp.status() {
                    StatusCode::ACCEPTED => Ok(OperationStatus::Running),
                    StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => {
                        Ok(OperationStatus::Succeeded)
                    }
                    _ => {
                        let status = resp.status();
                        match check_status(resp, "complete update").await {
                            Err(e) => Ok(OperationStatus::Failed(format!("{:#}", e))),
                            Ok(_) => Ok(OperationStatus::Failed(format!(
                                "unexpected status {} while polling",
                                status
                            ))),
                        }
                    }
                }
            }
            PollTarget::Tracked => bail!("Operation {} is not tracked by this provider", handle.id),
        }
    }

    async fn cancel_operation(&self, handle: &OperationHandle) -> Result<()> {
        // ARM has no cancel for tag updates; the operation may still complete.
        debug!(operation = %handle.id, resource = %handle.resource_id, "Cancel requested; stopping local polling");
        Ok(())
    }

    async fn get_resource(
        &self,
        resource_id: &str,
        api_version: &ApiVersion,
    ) -> Result<ResourceState> {
        let url = format!("{}{}?api-version={}", self.endpoint, resource_id, api_version);
        self.get_json(&url, &format!("read resource '{}'", resource_id))
            .await
    }
}
