//! `azscale elastic-pool`

use azscale_core::apply::{self, ensure_dtu_pool, read_pool};
use azscale_core::catalog::fetch_pool_catalog;
use azscale_core::resolve::{PoolRequest, format_dtu, resolve_pool_target};
use azscale_core::size::{bytes_to_human, parse_size_to_bytes};
use azscale_core::{CatalogLookup, PoolCatalog, PoolState, PoolTarget, ResourceRef};
use tracing::{debug, info, warn};

use super::{
    ScaleReport, apply_options, listing_format, print_outcome, print_resolution,
    progress_spinner,
};
use crate::cli::{self, PoolArgs};
use crate::connection::ConnectionManager;
use crate::error::{AzScaleError, Result as CliResult};
use crate::output::{OutputFormat, pool_option_table, print_output};

pub async fn handle_pool_command(
    args: &PoolArgs,
    conn_mgr: &ConnectionManager,
    output: cli::OutputFormat,
) -> CliResult<()> {
    // Bad input fails before any network call
    let request = if args.list_options {
        None
    } else {
        Some(build_request(args)?)
    };

    let client = conn_mgr.create_client(&args.resource)?;
    let resource = ResourceRef::ElasticPool {
        resource_group: args.resource.resource_group.clone(),
        server: args.server_name.clone(),
        pool: args.pool_name.clone(),
    };

    let current = read_pool(&client, &resource).await?;
    // vCore pools are rejected before any capability query, listings included
    ensure_dtu_pool(&current)?;

    let Some(request) = request else {
        let location = current.location.as_deref().ok_or(AzScaleError::UnknownLocation)?;
        let catalog: CatalogLookup<PoolCatalog> = fetch_pool_catalog(&client, location).await.into();
        return print_option_listing(&catalog, location, listing_format(output));
    };

    let structured = OutputFormat::structured(output);
    if structured.is_none() {
        println!("Current: {}", describe_pool(&current));
    }

    let catalog: CatalogLookup<PoolCatalog> = match current.location.as_deref() {
        Some(location) => fetch_pool_catalog(&client, location).await.into(),
        None if request.auto_adjust => return Err(AzScaleError::UnknownLocation),
        None => {
            warn!("Pool {} reports no location; skipping the capability query", args.pool_name);
            CatalogLookup::Unavailable {
                reason: "pool location unknown".to_string(),
            }
        }
    };

    let resolved = resolve_pool_target(&request, &current, &catalog)?;
    debug!("Resolved pool target: {:?}", resolved);
    if structured.is_none() {
        println!("Target:  {}", describe_target(&resolved.target));
        print_resolution(&resolved);
    }

    let options = apply_options(&args.resource, conn_mgr);
    let (spinner, on_progress) = progress_spinner(&options);
    let outcome =
        apply::apply_pool_change(&client, &resource, &current, &resolved, options, on_progress)
            .await;
    if let Some(pb) = spinner
        && !pb.is_finished()
    {
        pb.finish_and_clear();
    }
    let outcome = outcome?;
    info!("Pool {}: wrote update = {}", args.pool_name, outcome.wrote());

    match structured {
        Some(format) => print_output(
            ScaleReport {
                resource: resource.to_string(),
                current: &current,
                resolved: &resolved,
                result: &outcome,
            },
            format,
        ),
        None => {
            print_outcome(&outcome, |updated| {
                format!("New SKU: {}", describe_pool(updated))
            });
            Ok(())
        }
    }
}

fn build_request(args: &PoolArgs) -> CliResult<PoolRequest> {
    let tier = args.target_tier.ok_or_else(|| {
        azscale_core::ScaleError::Usage(
            "--target-tier is required unless --list-options is given".into(),
        )
    })?;
    let max_size_bytes = args
        .pool_max_size
        .as_deref()
        .map(parse_size_to_bytes)
        .transpose()?;

    Ok(PoolRequest {
        tier,
        capacity: args.pool_dtu,
        per_database_min: args.db_min_dtu,
        per_database_max: args.db_max_dtu,
        max_size_bytes,
        auto_adjust: args.auto_adjust,
    })
}

/// Print the region's DTU pool options
///
/// Exits non-zero when the query failed or returned nothing.
fn print_option_listing(
    catalog: &CatalogLookup<PoolCatalog>,
    location: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let catalog = match catalog {
        CatalogLookup::Available(catalog) if !catalog.is_empty() => catalog,
        CatalogLookup::Available(_) => {
            return Err(AzScaleError::NothingToList(format!(
                "No DTU elastic pool options returned for {}.",
                location
            )));
        }
        CatalogLookup::Unavailable { reason } => {
            return Err(AzScaleError::NothingToList(format!(
                "Could not list DTU elastic pool options for {}: {}",
                location, reason
            )));
        }
    };

    match format {
        OutputFormat::Table => {
            println!("DTU elastic pool options in {}:", location);
            println!("{}", pool_option_table(catalog));
            Ok(())
        }
        other => print_output(catalog.sorted(), other),
    }
}

fn describe_limits(min: Option<f64>, max: Option<f64>, size: Option<u64>) -> String {
    let dtu = |v: Option<f64>| v.map_or_else(|| "?".to_string(), format_dtu);
    format!(
        "per-db DTU {}-{}, max size {}",
        dtu(min),
        dtu(max),
        bytes_to_human(size)
    )
}

fn describe_pool(state: &PoolState) -> String {
    format!(
        "{} ({}), eDTU {}, {}",
        state.sku.name.as_deref().unwrap_or("unknown"),
        state.sku.tier.as_deref().unwrap_or("unknown tier"),
        state
            .sku
            .capacity
            .map_or_else(|| "unknown".to_string(), |c| c.to_string()),
        describe_limits(
            state.per_database_min,
            state.per_database_max,
            state.max_size_bytes
        )
    )
}

fn describe_target(target: &PoolTarget) -> String {
    let size = match target.max_size_bytes {
        Some(bytes) => bytes_to_human(Some(bytes)),
        None => "unchanged".to_string(),
    };
    format!(
        "{} ({}), eDTU {}, per-db DTU {}-{}, max size {}",
        target.sku_name,
        target.tier,
        target.capacity,
        format_dtu(target.per_database_min),
        format_dtu(target.per_database_max),
        size
    )
}
