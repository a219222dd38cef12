//! CLI structure and command definitions
//!
//! Two scaling commands share one shape: read the resource, look up what it
//! can become, resolve the request against that, then apply.

use azscale_core::DtuTier;
use clap::{Args, Parser, Subcommand};

/// Scale Azure App Service Plans and SQL DTU elastic pools
#[derive(Parser, Debug)]
#[command(name = "azscale")]
#[command(
    version,
    about = "Scale Azure App Service Plans and SQL DTU elastic pools"
)]
#[command(long_about = "
Scale Azure App Service Plans and SQL DTU elastic pools

Each run reads the live resource, checks the request against what the
region or plan supports, and sends at most one update. Unsupported values
are rejected unless auto-adjust is on, in which case they round down to the
closest supported value.

EXAMPLES:
    # Move a plan to P1v3 with 3 workers
    azscale app-service-plan -g my-rg --plan-name web --target-sku P1v3 --capacity 3

    # Show what would change without writing
    azscale plan -g my-rg --plan-name web --target-sku S2 --dry-run

    # Scale a pool to the closest Premium size at or below 150 eDTU
    azscale elastic-pool -g my-rg --server-name sql1 --pool-name pool1 \\
        --target-tier premium --pool-dtu 150 --auto-adjust

    # List the pool options in the pool's region as JSON
    azscale pool -g my-rg --server-name sql1 --pool-name pool1 --list-options -o json

For more help on a specific command, run:
    azscale <command> --help
")]
pub struct Cli {
    /// Path to alternate configuration file
    #[arg(long, global = true, env = "AZSCALE_CONFIG_FILE")]
    pub config_file: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "auto")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text, tables for listings
    Auto,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Human-readable table format
    Table,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Change the SKU and worker count of an App Service Plan
    #[command(name = "app-service-plan", visible_alias = "plan")]
    #[command(after_help = "EXAMPLES:
    # Scale up and out in one update
    azscale app-service-plan -g my-rg --plan-name web --target-sku P1v3 --capacity 3

    # Clamp an out-of-range worker count to the SKU's limits
    azscale app-service-plan -g my-rg --plan-name web --target-sku S1 --capacity 15 --auto-adjust-capacity

    # List the SKUs this plan can move to
    azscale app-service-plan -g my-rg --plan-name web --list-skus
")]
    AppServicePlan(PlanArgs),

    /// Change the tier, eDTU and limits of a SQL DTU elastic pool
    #[command(name = "elastic-pool", visible_alias = "pool")]
    #[command(after_help = "EXAMPLES:
    # Scale to Standard 100 eDTU with per-database limits
    azscale elastic-pool -g my-rg --server-name sql1 --pool-name pool1 \\
        --target-tier standard --pool-dtu 100 --db-min-dtu 10 --db-max-dtu 50

    # Round every value down to the closest supported one
    azscale elastic-pool -g my-rg --server-name sql1 --pool-name pool1 \\
        --target-tier premium --pool-dtu 150 --pool-max-size 300GB --auto-adjust

    # List tier/eDTU options for the pool's region
    azscale elastic-pool -g my-rg --server-name sql1 --pool-name pool1 --list-options
")]
    ElasticPool(PoolArgs),

    /// Version information
    #[command(visible_aliases = ["ver", "v"])]
    Version,

    /// Generate shell completions
    #[command(visible_alias = "comp")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments every scaling command takes
#[derive(Args, Debug, Clone)]
pub struct ResourceArgs {
    /// Subscription that owns the resource
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Resource group name
    #[arg(long, short = 'g')]
    pub resource_group: String,

    /// Show the changes without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Return as soon as the update is accepted
    #[arg(long)]
    pub no_wait: bool,

    /// Try the Azure CLI login before environment credentials
    #[arg(long)]
    pub prefer_az_cli: bool,
}

/// App Service Plan arguments
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub resource: ResourceArgs,

    /// App Service Plan name
    #[arg(long)]
    pub plan_name: String,

    /// SKU to move to, e.g. S1, P1v3 (case-insensitive)
    #[arg(long, required_unless_present = "list_skus")]
    pub target_sku: Option<String>,

    /// Worker count (defaults to the current count)
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    pub capacity: Option<i64>,

    /// Clamp the worker count into the SKU's supported range
    #[arg(long)]
    pub auto_adjust_capacity: bool,

    /// List the SKUs this plan can move to and exit
    #[arg(long)]
    pub list_skus: bool,
}

/// Elastic pool arguments
#[derive(Args, Debug, Clone)]
pub struct PoolArgs {
    #[command(flatten)]
    pub resource: ResourceArgs,

    /// Logical SQL server name
    #[arg(long)]
    pub server_name: String,

    /// Elastic pool name
    #[arg(long)]
    pub pool_name: String,

    /// DTU tier to move to
    #[arg(long, value_enum, ignore_case = true, required_unless_present = "list_options")]
    pub target_tier: Option<DtuTier>,

    /// Pool eDTU (defaults to the current eDTU, or 50)
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    pub pool_dtu: Option<i64>,

    /// Per-database minimum DTU
    #[arg(long)]
    pub db_min_dtu: Option<f64>,

    /// Per-database maximum DTU
    #[arg(long)]
    pub db_max_dtu: Option<f64>,

    /// Pool max size, e.g. 500MB, 5GB, 1TB or a byte count
    #[arg(long)]
    pub pool_max_size: Option<String>,

    /// Round unsupported values down to the closest supported one
    #[arg(long)]
    pub auto_adjust: bool,

    /// List the tier/eDTU options for the pool's region and exit
    #[arg(long)]
    pub list_options: bool,
}

/// Shells supported by `completions`
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_pool_aliases_and_tier_case() {
        let cli = Cli::try_parse_from([
            "azscale",
            "pool",
            "--subscription-id",
            "sub",
            "-g",
            "rg",
            "--server-name",
            "sql1",
            "--pool-name",
            "pool1",
            "--target-tier",
            "PREMIUM",
            "--pool-dtu",
            "150",
        ])
        .unwrap();

        let Commands::ElasticPool(args) = cli.command else {
            panic!("expected elastic-pool");
        };
        assert_eq!(args.target_tier, Some(DtuTier::Premium));
        assert_eq!(args.pool_dtu, Some(150));
        assert_eq!(args.resource.subscription_id.as_deref(), Some("sub"));
    }

    #[test]
    fn test_vcore_tier_is_rejected() {
        let result = Cli::try_parse_from([
            "azscale",
            "elastic-pool",
            "-g",
            "rg",
            "--server-name",
            "sql1",
            "--pool-name",
            "pool1",
            "--target-tier",
            "GeneralPurpose",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_listing_does_not_need_a_target() {
        let cli = Cli::try_parse_from([
            "azscale",
            "plan",
            "-g",
            "rg",
            "--plan-name",
            "web",
            "--list-skus",
        ])
        .unwrap();
        let Commands::AppServicePlan(args) = cli.command else {
            panic!("expected app-service-plan");
        };
        assert!(args.list_skus);
        assert!(args.target_sku.is_none());
    }

    #[test]
    fn test_plan_requires_target_sku() {
        let err = Cli::try_parse_from(["azscale", "plan", "-g", "rg", "--plan-name", "web"])
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = Cli::try_parse_from([
            "azscale",
            "plan",
            "-g",
            "rg",
            "--plan-name",
            "web",
            "--target-sku",
            "S1",
            "--capacity",
            "0",
        ]);
        assert!(result.is_err());
    }
}
