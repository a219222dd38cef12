//! Reading current state and applying a resolved target
//!
//! The applier compares every tracked attribute of the target with the
//! live resource. Nothing is written when they already match or when a
//! dry run was requested; otherwise exactly one update is issued.

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fmt::Display;
use tracing::{debug, info};

use crate::error::{ProviderError, Result, ScaleError};
use crate::model::{PlanState, PlanTarget, PoolState, PoolTarget, ResolvedTarget};
use crate::normalize::same_text;
use crate::progress::ProgressCallback;
use crate::provider::{ResourceReader, ResourceRef, ResourceWriter, WaitOptions};
use crate::resolve::format_dtu;
use crate::tiers::is_vcore_sku_name;

/// Shown with every rejected pool update
pub const POOL_UPDATE_HINT: &str =
    "Tip: invalid DTU/per-db/storage combos or current usage exceeding new caps can cause this.\n";

/// One attribute that differs between the live resource and the target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    /// `None` when the live value is unknown
    pub current: Option<String>,
    pub desired: String,
}

/// What applying a target did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome<S> {
    /// Live configuration already matches; nothing was written
    NoChange,
    /// Differences found but not written
    DryRun { changes: Vec<FieldChange> },
    /// Update accepted; not waited for
    Started { changes: Vec<FieldChange> },
    /// Update finished; `updated` is the state read back afterwards
    Completed { changes: Vec<FieldChange>, updated: S },
}

impl<S> ApplyOutcome<S> {
    /// Returns true if an update request was sent
    pub fn wrote(&self) -> bool {
        matches!(
            self,
            ApplyOutcome::Started { .. } | ApplyOutcome::Completed { .. }
        )
    }
}

/// How to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOptions {
    pub dry_run: bool,
    /// `None` returns as soon as the update is accepted
    pub wait: Option<WaitOptions>,
}

// ============================================================================
// Reading
// ============================================================================

/// Read a plan, returning the raw document and its canonical state
pub async fn read_plan(
    reader: &dyn ResourceReader,
    resource: &ResourceRef,
) -> Result<(Value, PlanState)> {
    let document = reader
        .get(resource)
        .await
        .map_err(|e| ScaleError::read(resource.to_string(), e))?;
    let state = PlanState::from_source(&document);
    debug!("Read {}: {:?}", resource, state);
    Ok((document, state))
}

/// Read a pool's canonical state
pub async fn read_pool(reader: &dyn ResourceReader, resource: &ResourceRef) -> Result<PoolState> {
    let document = reader
        .get(resource)
        .await
        .map_err(|e| ScaleError::read(resource.to_string(), e))?;
    let state = PoolState::from_source(&document);
    debug!("Read {}: {:?}", resource, state);
    Ok(state)
}

/// Reject pools from the vCore family before anything else is queried
pub fn ensure_dtu_pool(current: &PoolState) -> Result<()> {
    match current.sku.name.as_deref() {
        Some(name) if is_vcore_sku_name(name) => Err(ScaleError::UnsupportedResourceFamily(
            format!(
                "Pool SKU '{}' is vCore-based; only DTU elastic pools (Basic, Standard, Premium) can be changed",
                name
            ),
        )),
        _ => Ok(()),
    }
}

// ============================================================================
// Diffing
// ============================================================================

fn text_change(field: &'static str, current: Option<&str>, desired: &str) -> Option<FieldChange> {
    (!same_text(current, Some(desired))).then(|| FieldChange {
        field,
        current: current.map(str::to_string),
        desired: desired.to_string(),
    })
}

fn value_change<T: PartialEq + Display>(
    field: &'static str,
    current: Option<T>,
    desired: T,
) -> Option<FieldChange> {
    (current.as_ref() != Some(&desired)).then(|| FieldChange {
        field,
        current: current.map(|v| v.to_string()),
        desired: desired.to_string(),
    })
}

fn dtu_change(field: &'static str, current: Option<f64>, desired: f64) -> Option<FieldChange> {
    (current != Some(desired)).then(|| FieldChange {
        field,
        current: current.map(format_dtu),
        desired: format_dtu(desired),
    })
}

/// Attributes of a plan that the target would change
///
/// The tier is only compared when the target carries one.
pub fn diff_plan(current: &PlanState, target: &PlanTarget) -> Vec<FieldChange> {
    [
        text_change("sku", current.sku.name.as_deref(), &target.sku_name),
        target
            .tier
            .as_deref()
            .and_then(|tier| text_change("tier", current.sku.tier.as_deref(), tier)),
        value_change("capacity", current.sku.capacity, target.capacity),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Attributes of a pool that the target would change
pub fn diff_pool(current: &PoolState, target: &PoolTarget) -> Vec<FieldChange> {
    [
        text_change("sku", current.sku.name.as_deref(), &target.sku_name),
        text_change("tier", current.sku.tier.as_deref(), target.tier.as_str()),
        value_change("capacity", current.sku.capacity, target.capacity),
        dtu_change(
            "per_database_min",
            current.per_database_min,
            target.per_database_min,
        ),
        dtu_change(
            "per_database_max",
            current.per_database_max,
            target.per_database_max,
        ),
        target
            .max_size_bytes
            .and_then(|bytes| value_change("max_size_bytes", current.max_size_bytes, bytes)),
    ]
    .into_iter()
    .flatten()
    .collect()
}

// ============================================================================
// Update bodies
// ============================================================================

/// Full plan document carrying the new SKU
///
/// Everything else in the current document is sent back unchanged.
pub fn plan_update_body(document: &Value, target: &PlanTarget) -> Value {
    let mut body = match document {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    let mut sku = match body.remove("sku") {
        Some(Value::Object(sku)) => sku,
        _ => Map::new(),
    };
    sku.insert("name".into(), json!(target.sku_name));
    sku.insert("capacity".into(), json!(target.capacity));
    if let Some(tier) = &target.tier {
        sku.insert("tier".into(), json!(tier));
    }
    body.insert("sku".into(), Value::Object(sku));

    Value::Object(body)
}

/// Pool update carrying the full SKU and per-database settings
///
/// `maxSizeBytes` is only sent when known.
pub fn pool_update_body(target: &PoolTarget) -> Value {
    let mut properties = json!({
        "perDatabaseSettings": {
            "minCapacity": target.per_database_min,
            "maxCapacity": target.per_database_max,
        }
    });
    if let Some(bytes) = target.max_size_bytes {
        properties["maxSizeBytes"] = json!(bytes);
    }

    json!({
        "sku": {
            "name": target.sku_name,
            "tier": target.tier.as_str(),
            "capacity": target.capacity,
        },
        "properties": properties,
    })
}

// ============================================================================
// Applying
// ============================================================================

/// Apply a resolved plan target
pub async fn apply_plan_change(
    writer: &dyn ResourceWriter,
    resource: &ResourceRef,
    document: &Value,
    current: &PlanState,
    resolved: &ResolvedTarget<PlanTarget>,
    options: ApplyOptions,
    on_progress: Option<ProgressCallback>,
) -> Result<ApplyOutcome<PlanState>> {
    let changes = diff_plan(current, &resolved.target);
    let body = plan_update_body(document, &resolved.target);
    let updated = apply(writer, resource, changes, body, options, on_progress, "Plan", "").await?;
    Ok(updated.map_state(|doc| PlanState::from_source(&doc)))
}

/// Apply a resolved pool target
pub async fn apply_pool_change(
    writer: &dyn ResourceWriter,
    resource: &ResourceRef,
    current: &PoolState,
    resolved: &ResolvedTarget<PoolTarget>,
    options: ApplyOptions,
    on_progress: Option<ProgressCallback>,
) -> Result<ApplyOutcome<PoolState>> {
    ensure_dtu_pool(current)?;
    let changes = diff_pool(current, &resolved.target);
    let body = pool_update_body(&resolved.target);
    let updated = apply(
        writer,
        resource,
        changes,
        body,
        options,
        on_progress,
        "Elastic pool",
        POOL_UPDATE_HINT,
    )
    .await?;
    Ok(updated.map_state(|doc| PoolState::from_source(&doc)))
}

impl ApplyOutcome<Value> {
    fn map_state<S>(self, f: impl FnOnce(Value) -> S) -> ApplyOutcome<S> {
        match self {
            ApplyOutcome::NoChange => ApplyOutcome::NoChange,
            ApplyOutcome::DryRun { changes } => ApplyOutcome::DryRun { changes },
            ApplyOutcome::Started { changes } => ApplyOutcome::Started { changes },
            ApplyOutcome::Completed { changes, updated } => ApplyOutcome::Completed {
                changes,
                updated: f(updated),
            },
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn apply(
    writer: &dyn ResourceWriter,
    resource: &ResourceRef,
    changes: Vec<FieldChange>,
    body: Value,
    options: ApplyOptions,
    on_progress: Option<ProgressCallback>,
    label: &str,
    hint: &'static str,
) -> Result<ApplyOutcome<Value>> {
    if changes.is_empty() {
        info!("{} already matches the target", resource);
        return Ok(ApplyOutcome::NoChange);
    }
    if options.dry_run {
        info!("Dry run: {} change(s) to {} not applied", changes.len(), resource);
        return Ok(ApplyOutcome::DryRun { changes });
    }

    let update_failed = |source: ProviderError| ScaleError::UpdateFailed {
        resource: label.to_string(),
        hint,
        message: source.to_string(),
    };

    info!("Updating {}", resource);
    let handle = writer
        .begin_update(resource, &body)
        .await
        .map_err(update_failed)?;

    let Some(wait) = options.wait else {
        return Ok(ApplyOutcome::Started { changes });
    };

    let updated = writer
        .wait_for_completion(&handle, &wait, on_progress)
        .await
        .map_err(|e| match e {
            ProviderError::Timeout(after) => ScaleError::OperationTimeout(after),
            other => update_failed(other),
        })?;

    Ok(ApplyOutcome::Completed { changes, updated })
}
