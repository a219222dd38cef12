//! Connection management for the Azure Resource Manager client

use azscale_core::azure::{AzureClient, default_credential};
use azscale_core::{Config, ScaleError, WaitOptions};
use tracing::{debug, info};

use crate::cli::ResourceArgs;
use crate::error::{AzScaleError, Result as CliResult};

/// Creates authenticated clients from the loaded configuration
#[derive(Clone)]
pub struct ConnectionManager {
    pub config: Config,
}

impl ConnectionManager {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Pick the subscription: flag or `AZURE_SUBSCRIPTION_ID` first, then the config file
    pub fn resolve_subscription(&self, explicit: Option<&str>) -> CliResult<String> {
        explicit
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.config
                    .subscription_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .ok_or(AzScaleError::MissingSubscription)
    }

    /// Build a client for the subscription named by `args`
    pub fn create_client(&self, args: &ResourceArgs) -> CliResult<AzureClient> {
        let subscription = self.resolve_subscription(args.subscription_id.as_deref())?;
        let prefer_az_cli = args.prefer_az_cli || self.config.prefer_az_cli;
        debug!(
            "Credential order: {}",
            if prefer_az_cli {
                "az cli, environment"
            } else {
                "environment, az cli"
            }
        );

        let client = AzureClient::new(
            &self.config.management_endpoint,
            subscription,
            default_credential(prefer_az_cli),
        )
        .map_err(|e| ScaleError::Config(e.to_string()))?;

        info!(
            "Using subscription {} at {}",
            client.subscription_id(),
            self.config.management_endpoint
        );
        Ok(client)
    }

    /// Polling settings for `--wait` style updates
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: self.config.wait.timeout(),
            interval: self.config.wait.interval(),
        }
    }
}
