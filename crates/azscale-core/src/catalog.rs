//! Capability catalogs
//!
//! A catalog is the flattened, deduplicated set of scale configurations the
//! provider reports for one plan or one region. Catalogs keep discovery
//! order; presentation code sorts.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ScaleError};
use crate::model::{CapacityBounds, ScaleDescriptor};
use crate::normalize::{FieldSource, coerce_float, fold};
use crate::provider::{CapabilityQuery, CapabilityScope};
use crate::size::capability_size_to_bytes;
use crate::tiers::DtuTier;

/// Outcome of a capability lookup the caller may proceed without
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogLookup<C> {
    Available(C),
    /// The query could not be performed; `reason` is shown to the operator
    Unavailable { reason: String },
}

impl<C> CatalogLookup<C> {
    pub fn available(&self) -> Option<&C> {
        match self {
            CatalogLookup::Available(catalog) => Some(catalog),
            CatalogLookup::Unavailable { .. } => None,
        }
    }
}

impl<C> From<Result<C>> for CatalogLookup<C> {
    fn from(result: Result<C>) -> Self {
        match result {
            Ok(catalog) => CatalogLookup::Available(catalog),
            Err(ScaleError::CapabilityUnavailable(reason)) => CatalogLookup::Unavailable { reason },
            Err(err) => CatalogLookup::Unavailable {
                reason: err.to_string(),
            },
        }
    }
}

// ============================================================================
// App Service Plan SKUs
// ============================================================================

/// One selectable plan SKU with its worker bounds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkuOption {
    pub sku: ScaleDescriptor,
    pub bounds: CapacityBounds,
}

impl SkuOption {
    /// SKU name; catalog entries always have one
    pub fn name(&self) -> &str {
        self.sku.name.as_deref().unwrap_or_default()
    }
}

/// Selectable SKUs for one plan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SkuCatalog {
    options: Vec<SkuOption>,
}

impl SkuCatalog {
    /// Flatten a (possibly paged) SKU listing
    ///
    /// Entries without a SKU name are skipped. When the same name shows up
    /// again the first entry is kept.
    pub fn from_response(response: &dyn FieldSource) -> Self {
        let mut options: Vec<SkuOption> = Vec::new();

        for item in response.items() {
            let sku = ScaleDescriptor::from_source(&item.nested(&["sku"]));
            let Some(name) = sku.name.clone() else {
                continue;
            };
            let bounds = CapacityBounds::from_source(&item.nested(&["capacity"]));
            let option = SkuOption { sku, bounds };

            if let Some(existing) = options.iter().find(|o| o.sku.same_name(&name)) {
                if existing != &option {
                    debug!(
                        "Dropping conflicting SKU entry {} ({:?}, {:?}); keeping the first one",
                        name, option.sku.tier, option.bounds
                    );
                }
                continue;
            }
            options.push(option);
        }

        Self { options }
    }

    /// Case-insensitive lookup by SKU name
    pub fn find(&self, name: &str) -> Option<&SkuOption> {
        self.options.iter().find(|o| o.sku.same_name(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.options.iter().map(|o| o.name().to_string()).collect()
    }

    pub fn options(&self) -> &[SkuOption] {
        &self.options
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

// ============================================================================
// Elastic pool options
// ============================================================================

/// A per-database max limit and the min limits valid with it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerUnitLimit {
    pub max: f64,
    pub mins: Vec<f64>,
}

/// One selectable DTU elastic pool configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolOption {
    pub tier: DtuTier,
    pub capacity_units: i64,
    pub sku_name: String,
    /// Sorted, distinct
    pub per_unit_max_values: Vec<f64>,
    pub pool_max_bytes: Option<u64>,
    #[serde(skip)]
    pub per_unit_limits: Vec<PerUnitLimit>,
}

type PoolKey = (DtuTier, i64, String, Option<u64>, Vec<u64>);

impl PoolOption {
    fn key(&self) -> PoolKey {
        (
            self.tier,
            self.capacity_units,
            fold(&self.sku_name),
            self.pool_max_bytes,
            self.per_unit_max_values.iter().map(|v| v.to_bits()).collect(),
        )
    }

    /// Valid per-database minimums for a chosen maximum
    ///
    /// Uses the max-level entry nearest to `max`. Falls back to `[0.0]`
    /// when no minimums are reported.
    pub fn min_values_for_max(&self, max: f64) -> Vec<f64> {
        self.per_unit_limits
            .iter()
            .min_by(|a, b| (a.max - max).abs().total_cmp(&(b.max - max).abs()))
            .map(|limit| limit.mins.clone())
            .filter(|mins| !mins.is_empty())
            .unwrap_or_else(|| vec![0.0])
    }
}

/// DTU elastic pool options for one region
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolCatalog {
    options: Vec<PoolOption>,
}

impl PoolCatalog {
    /// Flatten a location capabilities tree
    ///
    /// Editions are read from the root and from every supported server
    /// version. Editions outside the DTU family are ignored.
    pub fn from_capabilities(capabilities: &dyn FieldSource) -> Self {
        let mut catalog = Self::default();

        let mut editions = capabilities
            .nested(&["supported_elastic_pool_editions", "supportedElasticPoolEditions"])
            .items();
        for version in capabilities
            .nested(&["supported_server_versions", "supportedServerVersions"])
            .items()
        {
            editions.extend(
                version
                    .nested(&["supported_elastic_pool_editions", "supportedElasticPoolEditions"])
                    .items(),
            );
        }

        for edition in editions {
            let Some(tier) = edition.get_str(&["name"]).as_deref().and_then(DtuTier::parse) else {
                continue;
            };

            for level in performance_levels(&edition) {
                if let Some(option) = pool_option(tier, &level) {
                    catalog.insert(option);
                }
            }
        }

        catalog
    }

    fn insert(&mut self, option: PoolOption) {
        if let Some(existing) = self.find(option.tier, option.capacity_units) {
            if existing.key() != option.key() {
                debug!(
                    "Dropping conflicting {} {} eDTU entry (max size {:?}, per-db max {:?}); keeping the first one",
                    option.tier, option.capacity_units, option.pool_max_bytes, option.per_unit_max_values
                );
            }
            return;
        }
        self.options.push(option);
    }

    pub fn find(&self, tier: DtuTier, capacity: i64) -> Option<&PoolOption> {
        self.options
            .iter()
            .find(|o| o.tier == tier && o.capacity_units == capacity)
    }

    pub fn for_tier(&self, tier: DtuTier) -> impl Iterator<Item = &PoolOption> {
        self.options.iter().filter(move |o| o.tier == tier)
    }

    /// Distinct eDTU values for a tier, ascending
    pub fn capacities(&self, tier: DtuTier) -> Vec<i64> {
        let mut values: Vec<i64> = self.for_tier(tier).map(|o| o.capacity_units).collect();
        values.sort_unstable();
        values.dedup();
        values
    }

    /// Options ordered by (tier, eDTU) for display
    pub fn sorted(&self) -> Vec<&PoolOption> {
        let mut options: Vec<&PoolOption> = self.options.iter().collect();
        options.sort_by_key(|o| (o.tier, o.capacity_units));
        options
    }

    pub fn options(&self) -> &[PoolOption] {
        &self.options
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

fn performance_levels(edition: &Value) -> Vec<Value> {
    let levels = edition
        .nested(&[
            "supported_elastic_pool_performance_levels",
            "supportedElasticPoolPerformanceLevels",
        ])
        .items();
    if !levels.is_empty() {
        return levels;
    }
    edition
        .nested(&["supported_elastic_pool_dtus", "supportedElasticPoolDtus"])
        .items()
}

fn pool_option(tier: DtuTier, level: &Value) -> Option<PoolOption> {
    let dtu = level
        .nested(&["performance_level", "performanceLevel"])
        .get_int(&["value"])
        .or_else(|| level.get_int(&["dtu", "DTU"]))?;

    let per_unit_limits: Vec<PerUnitLimit> = level
        .nested(&[
            "supported_per_database_max_performance_levels",
            "supportedPerDatabaseMaxPerformanceLevels",
        ])
        .items()
        .iter()
        .filter_map(|max_level| {
            let max = limit_of(max_level)?;
            let mins = sorted_distinct(
                max_level
                    .nested(&[
                        "supported_per_database_min_performance_levels",
                        "supportedPerDatabaseMinPerformanceLevels",
                    ])
                    .items()
                    .iter()
                    .filter_map(limit_of)
                    .collect(),
            );
            Some(PerUnitLimit { max, mins })
        })
        .collect();

    Some(PoolOption {
        tier,
        capacity_units: dtu,
        sku_name: tier.sku_name().to_string(),
        per_unit_max_values: sorted_distinct(per_unit_limits.iter().map(|l| l.max).collect()),
        pool_max_bytes: supported_pool_max_bytes(level),
        per_unit_limits,
    })
}

/// Largest pool size a performance level supports
fn supported_pool_max_bytes(level: &Value) -> Option<u64> {
    let ranges = level
        .nested(&["supported_max_sizes", "supportedMaxSizes"])
        .items()
        .into_iter()
        .filter_map(|range| capability_size_to_bytes(&range.nested(&["max_value", "maxValue"])));
    let included =
        capability_size_to_bytes(&level.nested(&["included_max_size", "includedMaxSize"]));

    ranges.chain(included).max()
}

fn limit_of(level: &Value) -> Option<f64> {
    coerce_float(level.get_any(&["limit"]).as_ref(), None)
}

fn sorted_distinct(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    values.dedup();
    values
}

// ============================================================================
// Fetching
// ============================================================================

/// Query the selectable SKUs of an existing plan
pub async fn fetch_sku_catalog(
    provider: &dyn CapabilityQuery,
    resource_group: &str,
    plan_name: &str,
) -> Result<SkuCatalog> {
    let scope = CapabilityScope::PlanSkus {
        resource_group: resource_group.to_string(),
        name: plan_name.to_string(),
    };
    let response = provider
        .list_capabilities(&scope)
        .await
        .map_err(|e| ScaleError::CapabilityUnavailable(e.to_string()))?;

    let catalog = SkuCatalog::from_response(&response);
    debug!("Plan '{}' has {} selectable SKU(s)", plan_name, catalog.options().len());
    Ok(catalog)
}

/// Query the DTU elastic pool options for a region
pub async fn fetch_pool_catalog(
    provider: &dyn CapabilityQuery,
    location: &str,
) -> Result<PoolCatalog> {
    let response = provider
        .list_capabilities(&CapabilityScope::elastic_pool_editions(location))
        .await
        .map_err(|e| ScaleError::CapabilityUnavailable(e.to_string()))?;

    let catalog = PoolCatalog::from_capabilities(&response);
    debug!("Location '{}' offers {} DTU pool option(s)", location, catalog.options().len());
    Ok(catalog)
}
