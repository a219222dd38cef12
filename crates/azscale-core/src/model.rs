//! Canonical records built from normalized provider responses

use serde::Serialize;
use serde_json::Value;

use crate::normalize::{FieldSource, same_text};
use crate::tiers::DtuTier;

/// Identity of a resource's current or target scale setting
///
/// `name` and `tier` compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScaleDescriptor {
    pub name: Option<String>,
    pub tier: Option<String>,
    pub capacity: Option<i64>,
}

impl ScaleDescriptor {
    /// Read a `sku` object (`name`, `tier`, `capacity`)
    pub fn from_source(sku: &dyn FieldSource) -> Self {
        Self {
            name: sku.get_str(&["name"]),
            tier: sku.get_str(&["tier"]),
            capacity: sku.get_int(&["capacity"]),
        }
    }

    /// Case-insensitive comparison of the name only
    #[must_use]
    pub fn same_name(&self, name: &str) -> bool {
        same_text(self.name.as_deref(), Some(name))
    }
}

/// Optional worker bounds; an absent bound is unconstrained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CapacityBounds {
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub default: Option<i64>,
}

impl CapacityBounds {
    /// Read a `capacity` object (`minimum`, `maximum`, `default`)
    pub fn from_source(capacity: &dyn FieldSource) -> Self {
        Self {
            minimum: capacity.get_int(&["minimum"]),
            maximum: capacity.get_int(&["maximum"]),
            default: capacity.get_int(&["default"]),
        }
    }
}

/// Look a field up on the record itself, then under its `properties` bag
fn property(source: &dyn FieldSource, names: &[&str]) -> Option<Value> {
    source
        .get_any(names)
        .or_else(|| source.nested(&["properties"]).get_any(names))
}

/// Current (or updated) state of an App Service Plan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanState {
    pub location: Option<String>,
    pub sku: ScaleDescriptor,
}

impl PlanState {
    pub fn from_source(plan: &dyn FieldSource) -> Self {
        Self {
            location: plan.get_str(&["location"]),
            sku: ScaleDescriptor::from_source(&plan.nested(&["sku"])),
        }
    }
}

/// Current (or updated) state of a SQL elastic pool
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolState {
    pub location: Option<String>,
    pub sku: ScaleDescriptor,
    pub per_database_min: Option<f64>,
    pub per_database_max: Option<f64>,
    pub max_size_bytes: Option<u64>,
}

impl PoolState {
    pub fn from_source(pool: &dyn FieldSource) -> Self {
        let settings = property(pool, &["per_database_settings", "perDatabaseSettings"])
            .unwrap_or(Value::Null);
        let max_size = property(pool, &["max_size_bytes", "maxSizeBytes"]);

        Self {
            location: pool.get_str(&["location"]),
            sku: ScaleDescriptor::from_source(&pool.nested(&["sku"])),
            per_database_min: settings.get_float(&["min_capacity", "minCapacity"]),
            per_database_max: settings.get_float(&["max_capacity", "maxCapacity"]),
            max_size_bytes: crate::normalize::coerce_int(max_size.as_ref(), None)
                .and_then(|b| u64::try_from(b).ok()),
        }
    }
}

/// Target for an App Service Plan update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanTarget {
    pub sku_name: String,
    /// Only known when the SKU was validated against the catalog
    pub tier: Option<String>,
    pub capacity: i64,
}

/// Target for an elastic pool update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolTarget {
    pub tier: DtuTier,
    pub sku_name: String,
    pub capacity: i64,
    pub per_database_min: f64,
    pub per_database_max: f64,
    pub max_size_bytes: Option<u64>,
}

/// Whether a target was checked against the capability catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Provenance {
    Validated,
    /// Accepted as requested because capability data was unavailable
    Unvalidated { reason: String },
}

/// One value changed by auto-adjust
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Adjustment {
    pub field: &'static str,
    pub requested: String,
    pub resolved: String,
}

/// The final configuration to apply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTarget<T> {
    pub target: T,
    pub provenance: Provenance,
    pub adjustments: Vec<Adjustment>,
}

impl<T> ResolvedTarget<T> {
    #[must_use]
    pub fn is_validated(&self) -> bool {
        matches!(self.provenance, Provenance::Validated)
    }
}
