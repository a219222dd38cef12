//! Unified error handling for azscale-core
//!
//! Every failure a scaling run can hit is a [`ScaleError`]. The variants
//! follow the operator-facing taxonomy: usage problems exit with code 2,
//! everything else with code 1. Nothing in this crate retries.
//!
//! # Example
//!
//! ```rust
//! use azscale_core::ScaleError;
//!
//! let err = ScaleError::NotSupported {
//!     what: "pool eDTU".to_string(),
//!     requested: "150".to_string(),
//!     available: vec!["50".into(), "100".into(), "200".into()],
//! };
//! assert_eq!(err.exit_code(), 1);
//! assert!(err.to_string().contains("50, 100, 200"));
//! ```

use std::time::Duration;
use thiserror::Error;

/// Error raised by the ARM client and the token credentials
#[derive(Error, Debug)]
pub enum ProviderError {
    /// 404 from the management API
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// 401/403, or no credential could produce a token
    #[error("Authentication failed: {message}")]
    Unauthorized { message: String },

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response
    #[error("Connection error: {0}")]
    Connection(String),

    /// The response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A long-running operation ended in `Failed` or `Canceled`
    #[error("Operation {status}: {message}")]
    OperationFailed { status: String, message: String },

    /// A long-running operation did not finish in time
    #[error("Operation did not complete within {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }

    /// Returns true if this is an authentication/authorization error (401/403)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ProviderError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::InvalidResponse(err.to_string())
    }
}

/// Core error type for a scaling run
#[derive(Error, Debug)]
pub enum ScaleError {
    /// Required input is missing or malformed
    #[error("{0}")]
    Usage(String),

    /// The resource to scale does not exist
    #[error("{resource} not found: {source}")]
    ResourceNotFound {
        resource: String,
        #[source]
        source: ProviderError,
    },

    /// Reading the resource failed for any other reason
    #[error("Failed to read {resource}: {source}")]
    ReadFailed {
        resource: String,
        #[source]
        source: ProviderError,
    },

    /// The capability query could not be performed
    #[error("Capabilities lookup failed: {0}")]
    CapabilityUnavailable(String),

    /// The requested value is not in the capability catalog
    #[error("{what} {requested} is not supported. Available: {}", format_available(.available))]
    NotSupported {
        what: String,
        requested: String,
        available: Vec<String>,
    },

    /// The resource belongs to a family this tool cannot scale
    #[error("{0}")]
    UnsupportedResourceFamily(String),

    /// The provider rejected the update
    #[error("{resource} update failed.\n{hint}{message}")]
    UpdateFailed {
        resource: String,
        hint: &'static str,
        message: String,
    },

    /// Waiting for the update exceeded the configured timeout
    #[error("Operation timed out after {0:?}")]
    OperationTimeout(Duration),

    /// A size string could not be parsed
    #[error("Invalid size format: '{0}' (use e.g. 5GB, 500MB, 5368709120)")]
    InvalidSize(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, ScaleError>;

impl ScaleError {
    /// Process exit code for this error: 2 for usage errors, 1 otherwise
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.is_usage() { 2 } else { 1 }
    }

    /// Returns true if the operator supplied incomplete or invalid input
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, ScaleError::Usage(_) | ScaleError::InvalidSize(_))
    }

    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScaleError::ResourceNotFound { .. })
    }

    /// Returns true if the capability catalog could not be obtained
    #[must_use]
    pub fn is_capability_unavailable(&self) -> bool {
        matches!(self, ScaleError::CapabilityUnavailable(_))
    }

    /// Returns true if this is a timeout error
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScaleError::OperationTimeout(_))
    }

    /// Map a read failure onto `ResourceNotFound` or `ReadFailed`
    pub fn read(resource: impl Into<String>, source: ProviderError) -> Self {
        let resource = resource.into();
        if source.is_not_found() {
            ScaleError::ResourceNotFound { resource, source }
        } else {
            ScaleError::ReadFailed { resource, source }
        }
    }
}

impl From<crate::config::ConfigError> for ScaleError {
    fn from(err: crate::config::ConfigError) -> Self {
        ScaleError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_errors_exit_with_two() {
        assert_eq!(ScaleError::Usage("missing".into()).exit_code(), 2);
        assert_eq!(ScaleError::InvalidSize("5XB".into()).exit_code(), 2);
        assert_eq!(
            ScaleError::CapabilityUnavailable("boom".into()).exit_code(),
            1
        );
    }

    #[test]
    fn test_read_maps_not_found() {
        let err = ScaleError::read(
            "App Service Plan 'web'",
            ProviderError::NotFound {
                message: "gone".into(),
            },
        );
        assert!(err.is_not_found());

        let err = ScaleError::read(
            "App Service Plan 'web'",
            ProviderError::Http {
                status: 500,
                message: "oops".into(),
            },
        );
        assert!(!err.is_not_found());
        assert!(err.to_string().starts_with("Failed to read App Service Plan 'web'"));
    }

    #[test]
    fn test_not_supported_lists_alternatives() {
        let err = ScaleError::NotSupported {
            what: "Premium eDTU".into(),
            requested: "150".into(),
            available: vec!["50".into(), "100".into(), "200".into()],
        };
        assert_eq!(
            err.to_string(),
            "Premium eDTU 150 is not supported. Available: 50, 100, 200"
        );

        let empty = ScaleError::NotSupported {
            what: "Basic eDTU".into(),
            requested: "5".into(),
            available: vec![],
        };
        assert!(empty.to_string().ends_with("Available: none"));
    }

    #[test]
    fn test_update_failed_carries_hint() {
        let err = ScaleError::UpdateFailed {
            resource: "Elastic pool".into(),
            hint: "Tip: check the combination.\n",
            message: "Conflict".into(),
        };
        let text = err.to_string();
        assert!(text.contains("Tip: check the combination."));
        assert!(text.ends_with("Conflict"));
    }

    #[test]
    fn test_provider_error_helpers() {
        assert!(!ProviderError::NotFound {
            message: String::new()
        }
        .is_unauthorized());
        assert!(ProviderError::Unauthorized {
            message: String::new()
        }
        .is_unauthorized());
    }
}
