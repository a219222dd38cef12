//! Progress tracking and polling for long-running ARM operations
//!
//! Updates to plans and pools are accepted immediately and finish in the
//! background. The provider exposes their state through an
//! `Azure-AsyncOperation` status URL, a `Location` URL, or, failing both,
//! the resource's own `provisioningState`. This module polls whichever is
//! available, with optional progress callbacks for UI updates.

use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::azure::AzureClient;
use crate::error::ProviderError;
use crate::normalize::FieldSource;
use crate::provider::{OperationHandle, ProviderResult, ResourceReader, WaitOptions};

/// Progress events emitted while waiting for an update
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Waiting has started
    Started { operation: String },
    /// Polling iteration with current status
    Polling {
        operation: String,
        status: String,
        elapsed: Duration,
    },
    /// Operation completed successfully
    Completed { operation: String },
    /// Operation failed or was cancelled
    Failed { operation: String, error: String },
}

/// Callback type for progress updates
///
/// The CLI uses this to drive its spinner.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Coarse state of a long-running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl OperationStatus {
    /// Classify an ARM status string (case-insensitive)
    pub fn parse(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "succeeded" | "success" | "completed" => OperationStatus::Succeeded,
            "failed" | "error" => OperationStatus::Failed,
            "canceled" | "cancelled" => OperationStatus::Canceled,
            _ => OperationStatus::InProgress,
        }
    }
}

/// Poll an accepted update until it reaches a terminal state
///
/// Returns the resource document as read after completion.
pub async fn poll_operation(
    client: &AzureClient,
    handle: &OperationHandle,
    options: &WaitOptions,
    on_progress: Option<ProgressCallback>,
) -> ProviderResult<Value> {
    let operation = handle.resource.to_string();
    let start = Instant::now();

    emit(
        &on_progress,
        ProgressEvent::Started {
            operation: operation.clone(),
        },
    );

    if !handle.completed {
        loop {
            let elapsed = start.elapsed();
            if elapsed > options.timeout {
                return Err(ProviderError::Timeout(options.timeout));
            }

            let (status, error) = current_status(client, handle).await?;
            debug!("Operation on {} is {}", operation, status);

            emit(
                &on_progress,
                ProgressEvent::Polling {
                    operation: operation.clone(),
                    status: status.clone(),
                    elapsed,
                },
            );

            match OperationStatus::parse(&status) {
                OperationStatus::Succeeded => break,
                OperationStatus::Failed | OperationStatus::Canceled => {
                    let error = error.unwrap_or_else(|| format!("Operation ended with status: {}", status));
                    emit(
                        &on_progress,
                        ProgressEvent::Failed {
                            operation: operation.clone(),
                            error: error.clone(),
                        },
                    );
                    return Err(ProviderError::OperationFailed { status, message: error });
                }
                OperationStatus::InProgress => {
                    tokio::time::sleep(options.interval).await;
                }
            }
        }
    }

    let updated = client.get(&handle.resource).await?;
    emit(&on_progress, ProgressEvent::Completed { operation });
    Ok(updated)
}

/// Fetch the current status string and, when failed, the error message
async fn current_status(
    client: &AzureClient,
    handle: &OperationHandle,
) -> ProviderResult<(String, Option<String>)> {
    if let Some(url) = &handle.async_operation_url {
        let body = client.get_url(url).await?.unwrap_or(Value::Null);
        let status = body.get_str(&["status"]).unwrap_or_else(|| "InProgress".to_string());
        return Ok((status, error_message(&body)));
    }

    if let Some(url) = &handle.location_url {
        // 202 while running, 200/201/204 once done
        return match client.get_url(url).await? {
            None => Ok(("InProgress".to_string(), None)),
            Some(body) => Ok((
                body.get_str(&["status"])
                    .unwrap_or_else(|| "Succeeded".to_string()),
                error_message(&body),
            )),
        };
    }

    let resource = client.get(&handle.resource).await?;
    let state = resource
        .get_any(&["provisioningState"])
        .or_else(|| resource.nested(&["properties"]).get_any(&["provisioningState", "state"]))
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "Succeeded".to_string());
    Ok((state, None))
}

fn error_message(body: &Value) -> Option<String> {
    let error = body.nested(&["error"]);
    error
        .get_str(&["message"])
        .or_else(|| error.get_str(&["code"]))
}

/// Helper to emit progress events
pub(crate) fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}
