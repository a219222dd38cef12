//! Error types for azscale
//!
//! Wraps the library errors and adds cargo-style diagnostics with tips.

use azscale_core::{ConfigError, ProviderError, ScaleError};
use colored::Colorize;
use thiserror::Error;

/// Cargo-style diagnostic formatter for CLI errors.
///
/// Produces structured output like:
/// ```text
/// error: SKU P9v9 is not supported. Available: S1, P1v3
///
///   tip: list the SKUs this plan can move to:
///       azscale app-service-plan ... --list-skus
/// ```
pub struct CliDiagnostic {
    message: String,
    detail: Option<String>,
    tips: Vec<(String, Vec<String>)>,
}

impl CliDiagnostic {
    /// Start a new error diagnostic with the given message.
    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            detail: None,
            tips: Vec::new(),
        }
    }

    /// Add a detail line below the error message.
    pub fn detail(mut self, text: &str) -> Self {
        self.detail = Some(text.to_string());
        self
    }

    /// Add a tip with optional example commands.
    pub fn tip(mut self, description: &str, commands: &[&str]) -> Self {
        self.tips.push((
            description.to_string(),
            commands.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Print the diagnostic to stderr with colored formatting.
    pub fn print(&self) {
        eprint!("{}{}", "error".red().bold(), ": ".bold());
        eprintln!("{}", self.message);

        if let Some(detail) = &self.detail {
            eprintln!("  {}", detail);
        }

        for (description, commands) in &self.tips {
            eprintln!();
            eprint!("  {}{}", "tip".yellow().bold(), ": ".bold());
            eprintln!("{}", description);
            for cmd in commands {
                eprintln!("      {}", cmd);
            }
        }
    }
}

/// Main error type for the azscale binary
#[derive(Error, Debug)]
pub enum AzScaleError {
    #[error(transparent)]
    Scale(#[from] ScaleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No subscription given. Pass --subscription-id, set AZURE_SUBSCRIPTION_ID, or add subscription_id to the config file.")]
    MissingSubscription,

    #[error("Pool location unknown; cannot query capabilities")]
    UnknownLocation,

    /// A listing had nothing to show
    #[error("{0}")]
    NothingToList(String),

    #[error("Output formatting error: {message}")]
    OutputError { message: String },
}

/// Result type for azscale commands
pub type Result<T> = std::result::Result<T, AzScaleError>;

impl AzScaleError {
    /// Process exit code: `2` for usage errors, `1` for everything else
    pub fn exit_code(&self) -> i32 {
        match self {
            AzScaleError::Scale(err) => err.exit_code(),
            AzScaleError::MissingSubscription => 2,
            _ => 1,
        }
    }

    /// Get helpful suggestions for resolving this error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            AzScaleError::MissingSubscription => vec![
                "Find your subscription id: az account show --query id -o tsv".to_string(),
            ],
            AzScaleError::Config(_) => vec![
                "Check the file named by --config-file or AZSCALE_CONFIG_FILE".to_string(),
            ],
            AzScaleError::Scale(ScaleError::ReadFailed { source, .. })
                if source.is_unauthorized() =>
            {
                vec![
                    "Sign in with the Azure CLI: az login".to_string(),
                    "Or set AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET".to_string(),
                ]
            }
            AzScaleError::Scale(ScaleError::ReadFailed {
                source: ProviderError::Connection(_),
                ..
            }) => vec![
                "Check network connectivity and the management_endpoint setting".to_string(),
            ],
            AzScaleError::Scale(ScaleError::ResourceNotFound { .. }) => vec![
                "Verify the resource group and resource names".to_string(),
                "Check that the subscription id is the one that owns the resource".to_string(),
            ],
            AzScaleError::Scale(ScaleError::NotSupported { .. }) => vec![
                "Pass --auto-adjust (pools) or --auto-adjust-capacity (plans) to round down to the closest supported value".to_string(),
                "List what is available with --list-options or --list-skus".to_string(),
            ],
            AzScaleError::Scale(ScaleError::CapabilityUnavailable(_)) => vec![
                "Run without auto-adjust to send the request unvalidated".to_string(),
            ],
            AzScaleError::Scale(ScaleError::OperationTimeout(_)) => vec![
                "The update may still finish; rerun with --dry-run to check the current state".to_string(),
                "Raise [wait] timeout_secs in the config file".to_string(),
            ],
            _ => vec![],
        }
    }

    /// Print a cargo-style diagnostic to stderr using colored formatting.
    pub fn print_diagnostic(&self) {
        let mut diag = CliDiagnostic::error(&format!("{}", self));

        if let AzScaleError::Scale(ScaleError::UnsupportedResourceFamily(_)) = self {
            diag = diag.detail("This tool only scales DTU elastic pools.");
        }

        for suggestion in self.suggestions() {
            diag = diag.tip(&suggestion, &[]);
        }

        diag.print();
    }
}

impl From<serde_json::Error> for AzScaleError {
    fn from(err: serde_json::Error) -> Self {
        AzScaleError::OutputError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for AzScaleError {
    fn from(err: serde_yaml::Error) -> Self {
        AzScaleError::OutputError {
            message: err.to_string(),
        }
    }
}
