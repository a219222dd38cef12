//! Target resolution against a capability catalog
//!
//! A request that appears in the catalog is accepted as is. Otherwise it is
//! rejected, or, with auto-adjust, moved to the closest allowed value at or
//! below the request. Capacity is fixed first because the valid secondary
//! values (per-database limits, pool size) depend on it.

use tracing::info;

use crate::catalog::{CatalogLookup, PoolCatalog, SkuCatalog};
use crate::error::{Result, ScaleError};
use crate::model::{
    Adjustment, PlanState, PlanTarget, PoolState, PoolTarget, Provenance, ResolvedTarget,
};
use crate::size::bytes_to_human;
use crate::tiers::DtuTier;

/// Pool eDTU when neither the request nor the pool says otherwise
pub const DEFAULT_POOL_DTU: i64 = 50;
/// Per-database minimum DTU default
pub const DEFAULT_DB_MIN_DTU: f64 = 0.0;
/// Per-database maximum DTU default
pub const DEFAULT_DB_MAX_DTU: f64 = 5.0;
/// Plan worker count default
pub const DEFAULT_PLAN_CAPACITY: i64 = 1;

/// Greatest value not above `want`, or the smallest value when all are above
///
/// Returns `None` only for an empty slice.
pub fn choose_closest_leq<T: PartialOrd + Copy>(values: &[T], want: T) -> Option<T> {
    let at_or_below = values
        .iter()
        .copied()
        .filter(|v| *v <= want)
        .reduce(|best, v| if v > best { v } else { best });

    at_or_below.or_else(|| {
        values
            .iter()
            .copied()
            .reduce(|best, v| if v < best { v } else { best })
    })
}

/// Render a DTU value without a trailing `.0`
pub fn format_dtu(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

fn join<T>(values: &[T], render: impl Fn(&T) -> String) -> Vec<String> {
    values.iter().map(render).collect()
}

fn adjusted(field: &'static str, requested: String, resolved: String) -> Adjustment {
    info!("Auto-adjusting {} from {} to {}", field, requested, resolved);
    Adjustment {
        field,
        requested,
        resolved,
    }
}

// ============================================================================
// App Service Plan
// ============================================================================

/// What the operator asked for on a plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub target_sku: String,
    pub capacity: Option<i64>,
    pub auto_adjust: bool,
}

/// Resolve a plan request against its selectable SKUs
///
/// Worker count defaults to the requested value, then the current one,
/// then one worker.
pub fn resolve_plan_target(
    request: &PlanRequest,
    current: &PlanState,
    catalog: &CatalogLookup<SkuCatalog>,
) -> Result<ResolvedTarget<PlanTarget>> {
    let requested_capacity = request
        .capacity
        .or(current.sku.capacity)
        .unwrap_or(DEFAULT_PLAN_CAPACITY);

    let catalog = match catalog {
        CatalogLookup::Available(catalog) => catalog,
        CatalogLookup::Unavailable { reason } => {
            if request.auto_adjust {
                return Err(ScaleError::CapabilityUnavailable(format!(
                    "{}; cannot auto-adjust without capability data",
                    reason
                )));
            }
            return Ok(ResolvedTarget {
                target: PlanTarget {
                    sku_name: request.target_sku.clone(),
                    tier: None,
                    capacity: requested_capacity,
                },
                provenance: Provenance::Unvalidated {
                    reason: reason.clone(),
                },
                adjustments: Vec::new(),
            });
        }
    };

    let option = catalog
        .find(&request.target_sku)
        .ok_or_else(|| ScaleError::NotSupported {
            what: "SKU".to_string(),
            requested: request.target_sku.clone(),
            available: catalog.names(),
        })?;

    let bounds = option.bounds;
    let mut capacity = requested_capacity;
    let mut adjustments = Vec::new();

    let limit = match (bounds.minimum, bounds.maximum) {
        (Some(min), _) if capacity < min => Some(min),
        (_, Some(max)) if capacity > max => Some(max),
        _ => None,
    };

    if let Some(limit) = limit {
        if !request.auto_adjust {
            let range = format!(
                "{}-{}",
                bounds.minimum.map_or("?".to_string(), |v| v.to_string()),
                bounds.maximum.map_or("?".to_string(), |v| v.to_string())
            );
            return Err(ScaleError::NotSupported {
                what: format!("{} worker count", option.name()),
                requested: capacity.to_string(),
                available: vec![range],
            });
        }
        adjustments.push(adjusted(
            "capacity",
            capacity.to_string(),
            limit.to_string(),
        ));
        capacity = limit;
    }

    Ok(ResolvedTarget {
        target: PlanTarget {
            sku_name: option.name().to_string(),
            tier: option.sku.tier.clone(),
            capacity,
        },
        provenance: Provenance::Validated,
        adjustments,
    })
}

// ============================================================================
// Elastic pool
// ============================================================================

/// What the operator asked for on a pool
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRequest {
    pub tier: DtuTier,
    pub capacity: Option<i64>,
    pub per_database_min: Option<f64>,
    pub per_database_max: Option<f64>,
    pub max_size_bytes: Option<u64>,
    pub auto_adjust: bool,
}

/// Resolve a pool request against the region's DTU options
///
/// Unset values keep the pool's current setting, falling back to
/// [`DEFAULT_POOL_DTU`], [`DEFAULT_DB_MIN_DTU`] and [`DEFAULT_DB_MAX_DTU`].
pub fn resolve_pool_target(
    request: &PoolRequest,
    current: &PoolState,
    catalog: &CatalogLookup<PoolCatalog>,
) -> Result<ResolvedTarget<PoolTarget>> {
    let tier = request.tier;
    let mut target = PoolTarget {
        tier,
        sku_name: tier.sku_name().to_string(),
        capacity: request
            .capacity
            .or(current.sku.capacity)
            .unwrap_or(DEFAULT_POOL_DTU),
        per_database_min: request
            .per_database_min
            .or(current.per_database_min)
            .unwrap_or(DEFAULT_DB_MIN_DTU),
        per_database_max: request
            .per_database_max
            .or(current.per_database_max)
            .unwrap_or(DEFAULT_DB_MAX_DTU),
        max_size_bytes: request.max_size_bytes.or(current.max_size_bytes),
    };

    let catalog = match catalog {
        CatalogLookup::Available(catalog) => catalog,
        CatalogLookup::Unavailable { reason } => {
            if request.auto_adjust {
                return Err(ScaleError::CapabilityUnavailable(format!(
                    "{}; cannot auto-adjust without capability data",
                    reason
                )));
            }
            return Ok(ResolvedTarget {
                target,
                provenance: Provenance::Unvalidated {
                    reason: reason.clone(),
                },
                adjustments: Vec::new(),
            });
        }
    };

    let mut adjustments = Vec::new();

    // Capacity
    let capacities = catalog.capacities(tier);
    if !capacities.contains(&target.capacity) {
        let closest = choose_closest_leq(&capacities, target.capacity);
        match closest {
            Some(dtu) if request.auto_adjust => {
                adjustments.push(adjusted(
                    "eDTU",
                    target.capacity.to_string(),
                    dtu.to_string(),
                ));
                target.capacity = dtu;
            }
            _ => {
                return Err(ScaleError::NotSupported {
                    what: format!("{} eDTU", tier),
                    requested: target.capacity.to_string(),
                    available: join(&capacities, |v| v.to_string()),
                });
            }
        }
    }

    let option = catalog
        .find(tier, target.capacity)
        .ok_or_else(|| ScaleError::NotSupported {
            what: format!("{} eDTU", tier),
            requested: target.capacity.to_string(),
            available: join(&capacities, |v| v.to_string()),
        })?;

    // Per-database max, then the min valid for that max
    let max_values = &option.per_unit_max_values;
    if !max_values.is_empty() {
        if !max_values.contains(&target.per_database_max) {
            let what = format!(
                "Per-database max DTU for {} {} eDTU",
                tier, target.capacity
            );
            target.per_database_max = pick(
                max_values,
                target.per_database_max,
                request.auto_adjust,
                "per-database max DTU",
                what,
                &mut adjustments,
            )?;
        }

        let min_values = option.min_values_for_max(target.per_database_max);
        if !min_values.contains(&target.per_database_min) {
            let what = format!(
                "Per-database min DTU (with max {})",
                format_dtu(target.per_database_max)
            );
            target.per_database_min = pick(
                &min_values,
                target.per_database_min,
                request.auto_adjust,
                "per-database min DTU",
                what,
                &mut adjustments,
            )?;
        }
    }

    // Pool size ceiling
    if let (Some(ceiling), Some(wanted)) = (option.pool_max_bytes, target.max_size_bytes)
        && wanted > ceiling
    {
        if !request.auto_adjust {
            return Err(ScaleError::NotSupported {
                what: format!("Pool max size for {} {} eDTU", tier, target.capacity),
                requested: bytes_to_human(Some(wanted)),
                available: vec![format!("up to {}", bytes_to_human(Some(ceiling)))],
            });
        }
        let resolved = choose_closest_leq(&[ceiling], wanted).unwrap_or(ceiling);
        adjustments.push(adjusted(
            "pool max size",
            bytes_to_human(Some(wanted)),
            bytes_to_human(Some(resolved)),
        ));
        target.max_size_bytes = Some(resolved);
    }

    Ok(ResolvedTarget {
        target,
        provenance: Provenance::Validated,
        adjustments,
    })
}

/// Adjust a per-database value or fail listing the valid ones
fn pick(
    values: &[f64],
    wanted: f64,
    auto_adjust: bool,
    field: &'static str,
    what: String,
    adjustments: &mut Vec<Adjustment>,
) -> Result<f64> {
    match choose_closest_leq(values, wanted) {
        Some(value) if auto_adjust => {
            adjustments.push(adjusted(field, format_dtu(wanted), format_dtu(value)));
            Ok(value)
        }
        _ => Err(ScaleError::NotSupported {
            what,
            requested: format_dtu(wanted),
            available: join(values, |v| format_dtu(*v)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PoolCatalog;
    use crate::model::ScaleDescriptor;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn pool_catalog() -> PoolCatalog {
        let level = |dtu: i64, max_gb: i64| {
            json!({
                "performanceLevel": {"value": dtu},
                "supportedMaxSizes": [{"maxValue": {"limit": max_gb, "unit": "Gigabytes"}}],
                "supportedPerDatabaseMaxPerformanceLevels": [
                    {"limit": 25, "supportedPerDatabaseMinPerformanceLevels": [{"limit": 0}, {"limit": 25}]},
                    {"limit": 50, "supportedPerDatabaseMinPerformanceLevels": [{"limit": 0}, {"limit": 25}, {"limit": 50}]}
                ]
            })
        };
        PoolCatalog::from_capabilities(&json!({
            "supportedElasticPoolEditions": [
                {"name": "Premium", "supportedElasticPoolPerformanceLevels": [level(50, 250), level(100, 500), level(200, 750)]}
            ]
        }))
    }

    fn premium_pool(capacity: i64) -> PoolState {
        PoolState {
            location: Some("westeurope".into()),
            sku: ScaleDescriptor {
                name: Some("PremiumPool".into()),
                tier: Some("Premium".into()),
                capacity: Some(capacity),
            },
            per_database_min: Some(0.0),
            per_database_max: Some(25.0),
            max_size_bytes: Some(250 * GIB),
        }
    }

    fn premium_request(capacity: i64, auto_adjust: bool) -> PoolRequest {
        PoolRequest {
            tier: DtuTier::Premium,
            capacity: Some(capacity),
            per_database_min: None,
            per_database_max: None,
            max_size_bytes: None,
            auto_adjust,
        }
    }

    #[test]
    fn test_choose_closest_leq() {
        assert_eq!(choose_closest_leq(&[10, 50, 100], 75), Some(50));
        assert_eq!(choose_closest_leq(&[10, 50, 100], 5), Some(10));
        assert_eq!(choose_closest_leq(&[10, 50, 100], 100), Some(100));
        assert_eq!(choose_closest_leq(&[100, 10, 50], 1000), Some(100));
        assert_eq!(choose_closest_leq(&[0.0, 2.5, 5.0], 3.0), Some(2.5));
        assert_eq!(choose_closest_leq::<i64>(&[], 3), None);
    }

    #[test]
    fn test_pool_exact_match_is_unchanged() {
        let resolved = resolve_pool_target(
            &premium_request(100, false),
            &premium_pool(50),
            &CatalogLookup::Available(pool_catalog()),
        )
        .unwrap();
        assert!(resolved.is_validated());
        assert!(resolved.adjustments.is_empty());
        assert_eq!(resolved.target.capacity, 100);
        assert_eq!(resolved.target.sku_name, "PremiumPool");
    }

    #[test]
    fn test_pool_auto_adjust_rounds_down() {
        let resolved = resolve_pool_target(
            &premium_request(150, true),
            &premium_pool(50),
            &CatalogLookup::Available(pool_catalog()),
        )
        .unwrap();
        assert_eq!(resolved.target.capacity, 100);
        assert_eq!(resolved.adjustments[0].field, "eDTU");
        assert_eq!(resolved.adjustments[0].resolved, "100");
    }

    #[test]
    fn test_pool_without_auto_adjust_lists_alternatives() {
        let err = resolve_pool_target(
            &premium_request(150, false),
            &premium_pool(50),
            &CatalogLookup::Available(pool_catalog()),
        )
        .unwrap_err();
        match err {
            ScaleError::NotSupported { available, .. } => {
                assert_eq!(available, vec!["50", "100", "200"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pool_below_range_floors_to_minimum() {
        let resolved = resolve_pool_target(
            &premium_request(10, true),
            &premium_pool(50),
            &CatalogLookup::Available(pool_catalog()),
        )
        .unwrap();
        assert_eq!(resolved.target.capacity, 50);
    }

    #[test]
    fn test_pool_tier_without_options() {
        let mut request = premium_request(100, true);
        request.tier = DtuTier::Basic;
        let err = resolve_pool_target(
            &request,
            &premium_pool(50),
            &CatalogLookup::Available(pool_catalog()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Basic eDTU 100 is not supported. Available: none"
        );
    }

    #[test]
    fn test_pool_secondary_values_adjust_after_capacity() {
        let request = PoolRequest {
            per_database_max: Some(40.0),
            per_database_min: Some(30.0),
            max_size_bytes: Some(1024 * GIB),
            ..premium_request(150, true)
        };
        let resolved = resolve_pool_target(
            &request,
            &premium_pool(50),
            &CatalogLookup::Available(pool_catalog()),
        )
        .unwrap();
        let target = &resolved.target;
        assert_eq!(target.capacity, 100);
        assert_eq!(target.per_database_max, 25.0);
        assert_eq!(target.per_database_min, 25.0);
        assert_eq!(target.max_size_bytes, Some(500 * GIB));

        let fields: Vec<&str> = resolved.adjustments.iter().map(|a| a.field).collect();
        assert_eq!(
            fields,
            vec![
                "eDTU",
                "per-database max DTU",
                "per-database min DTU",
                "pool max size"
            ]
        );
    }

    #[test]
    fn test_pool_size_over_ceiling_without_auto_adjust() {
        let request = PoolRequest {
            max_size_bytes: Some(1024 * GIB),
            ..premium_request(100, false)
        };
        let err = resolve_pool_target(
            &request,
            &premium_pool(100),
            &CatalogLookup::Available(pool_catalog()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("up to 500.0GB"));
    }

    #[test]
    fn test_unavailable_catalog() {
        let lookup = CatalogLookup::Unavailable {
            reason: "HTTP 503: busy".to_string(),
        };
        let resolved =
            resolve_pool_target(&premium_request(150, false), &premium_pool(50), &lookup).unwrap();
        assert_eq!(resolved.target.capacity, 150);
        assert_eq!(
            resolved.provenance,
            Provenance::Unvalidated {
                reason: "HTTP 503: busy".into()
            }
        );

        let err =
            resolve_pool_target(&premium_request(150, true), &premium_pool(50), &lookup).unwrap_err();
        assert!(err.is_capability_unavailable());
    }

    #[test]
    fn test_pool_defaults_from_current_state() {
        let request = PoolRequest {
            tier: DtuTier::Premium,
            capacity: None,
            per_database_min: None,
            per_database_max: None,
            max_size_bytes: None,
            auto_adjust: false,
        };
        let resolved = resolve_pool_target(
            &request,
            &premium_pool(200),
            &CatalogLookup::Available(pool_catalog()),
        )
        .unwrap();
        assert_eq!(resolved.target.capacity, 200);
        assert_eq!(resolved.target.per_database_max, 25.0);
        assert_eq!(resolved.target.max_size_bytes, Some(250 * GIB));

        let unknown = PoolState::default();
        let lookup = CatalogLookup::Unavailable {
            reason: "offline".into(),
        };
        let resolved = resolve_pool_target(&request, &unknown, &lookup).unwrap();
        assert_eq!(resolved.target.capacity, DEFAULT_POOL_DTU);
        assert_eq!(resolved.target.per_database_min, DEFAULT_DB_MIN_DTU);
        assert_eq!(resolved.target.per_database_max, DEFAULT_DB_MAX_DTU);
        assert_eq!(resolved.target.max_size_bytes, None);
    }

    fn sku_catalog() -> SkuCatalog {
        SkuCatalog::from_response(&json!([
            {"sku": {"name": "P1v3", "tier": "PremiumV3"}, "capacity": {"minimum": 1, "maximum": 30, "default": 1}},
            {"sku": {"name": "S1", "tier": "Standard"}, "capacity": {"minimum": 1, "maximum": 10}}
        ]))
    }

    fn plan(capacity: Option<i64>) -> PlanState {
        PlanState {
            location: Some("westeurope".into()),
            sku: ScaleDescriptor {
                name: Some("S1".into()),
                tier: Some("Standard".into()),
                capacity,
            },
        }
    }

    #[test]
    fn test_plan_validated_takes_catalog_casing_and_tier() {
        let request = PlanRequest {
            target_sku: "p1V3".into(),
            capacity: None,
            auto_adjust: false,
        };
        let resolved =
            resolve_plan_target(&request, &plan(Some(3)), &CatalogLookup::Available(sku_catalog()))
                .unwrap();
        assert_eq!(
            resolved.target,
            PlanTarget {
                sku_name: "P1v3".into(),
                tier: Some("PremiumV3".into()),
                capacity: 3,
            }
        );
    }

    #[test]
    fn test_plan_capacity_bounds() {
        let request = PlanRequest {
            target_sku: "S1".into(),
            capacity: Some(15),
            auto_adjust: false,
        };
        let err =
            resolve_plan_target(&request, &plan(Some(1)), &CatalogLookup::Available(sku_catalog()))
                .unwrap_err();
        assert_eq!(
            err.to_string(),
            "S1 worker count 15 is not supported. Available: 1-10"
        );

        let request = PlanRequest {
            auto_adjust: true,
            ..request
        };
        let resolved =
            resolve_plan_target(&request, &plan(Some(1)), &CatalogLookup::Available(sku_catalog()))
                .unwrap();
        assert_eq!(resolved.target.capacity, 10);

        let request = PlanRequest {
            capacity: Some(0),
            ..request
        };
        let resolved =
            resolve_plan_target(&request, &plan(Some(1)), &CatalogLookup::Available(sku_catalog()))
                .unwrap();
        assert_eq!(resolved.target.capacity, 1);
    }

    #[test]
    fn test_plan_unknown_sku() {
        let request = PlanRequest {
            target_sku: "I9".into(),
            capacity: None,
            auto_adjust: true,
        };
        let err =
            resolve_plan_target(&request, &plan(None), &CatalogLookup::Available(sku_catalog()))
                .unwrap_err();
        assert_eq!(
            err.to_string(),
            "SKU I9 is not supported. Available: P1v3, S1"
        );
    }

    #[test]
    fn test_plan_unavailable_catalog() {
        let lookup = CatalogLookup::Unavailable {
            reason: "forbidden".into(),
        };
        let request = PlanRequest {
            target_sku: "P1v3".into(),
            capacity: None,
            auto_adjust: false,
        };
        let resolved = resolve_plan_target(&request, &plan(None), &lookup).unwrap();
        assert!(!resolved.is_validated());
        assert_eq!(resolved.target.tier, None);
        assert_eq!(resolved.target.capacity, DEFAULT_PLAN_CAPACITY);

        let request = PlanRequest {
            auto_adjust: true,
            ..request
        };
        assert!(
            resolve_plan_target(&request, &plan(None), &lookup)
                .unwrap_err()
                .is_capability_unavailable()
        );
    }

    #[test]
    fn test_format_dtu() {
        assert_eq!(format_dtu(5.0), "5");
        assert_eq!(format_dtu(2.5), "2.5");
    }
}
