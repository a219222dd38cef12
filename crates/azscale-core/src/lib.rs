//! # azscale-core
//!
//! Library behind the `azscale` CLI. It changes the scale of two Azure
//! resources, an App Service Plan and a SQL DTU elastic pool, in four
//! steps that mirror each other for both:
//!
//! 1. **Normalize** provider responses into canonical records
//!    ([`normalize`], [`model`]). Wire JSON and typed records read the same.
//! 2. **Build a catalog** of valid configurations from one capability
//!    query ([`catalog`]).
//! 3. **Resolve** the requested target against the catalog, rounding down
//!    to the closest allowed value when auto-adjust is on ([`resolve`]).
//! 4. **Apply** the target: no-op, dry run, or exactly one update
//!    ([`apply`]).
//!
//! The provider is reached only through the traits in [`provider`];
//! [`azure::AzureClient`] implements them against Azure Resource Manager.
//!
//! ## Example
//!
//! ```rust
//! use azscale_core::resolve::choose_closest_leq;
//!
//! assert_eq!(choose_closest_leq(&[10, 50, 100], 75), Some(50));
//! // Below every option: floors to the smallest one
//! assert_eq!(choose_closest_leq(&[10, 50, 100], 5), Some(10));
//! ```

pub mod apply;
pub mod azure;
pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod progress;
pub mod provider;
pub mod resolve;
pub mod size;
pub mod tiers;

pub use apply::{ApplyOptions, ApplyOutcome, FieldChange};
pub use catalog::{CatalogLookup, PoolCatalog, PoolOption, SkuCatalog, SkuOption};
pub use config::{Config, ConfigError};
pub use error::{ProviderError, Result, ScaleError};
pub use model::{
    Adjustment, CapacityBounds, PlanState, PlanTarget, PoolState, PoolTarget, Provenance,
    ResolvedTarget, ScaleDescriptor,
};
pub use progress::{ProgressCallback, ProgressEvent};
pub use provider::{ResourceRef, WaitOptions};
pub use tiers::DtuTier;
