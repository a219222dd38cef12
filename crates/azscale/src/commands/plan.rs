//! `azscale app-service-plan`

use azscale_core::apply::{self, read_plan};
use azscale_core::catalog::fetch_sku_catalog;
use azscale_core::resolve::{PlanRequest, resolve_plan_target};
use azscale_core::{CatalogLookup, PlanState, PlanTarget, ResourceRef, ScaleError, SkuCatalog};
use tracing::{debug, info};

use super::{
    ScaleReport, apply_options, listing_format, print_outcome, print_resolution,
    progress_spinner,
};
use crate::cli::{self, PlanArgs};
use crate::connection::ConnectionManager;
use crate::error::{AzScaleError, Result as CliResult};
use crate::output::{OutputFormat, print_output, sku_table};

pub async fn handle_plan_command(
    args: &PlanArgs,
    conn_mgr: &ConnectionManager,
    output: cli::OutputFormat,
) -> CliResult<()> {
    let target_sku = if args.list_skus {
        None
    } else {
        Some(required_target_sku(args)?)
    };

    let client = conn_mgr.create_client(&args.resource)?;
    let resource = ResourceRef::AppServicePlan {
        resource_group: args.resource.resource_group.clone(),
        name: args.plan_name.clone(),
    };

    let Some(target_sku) = target_sku else {
        let catalog: CatalogLookup<SkuCatalog> = fetch_sku_catalog(
            &client,
            &args.resource.resource_group,
            &args.plan_name,
        )
        .await
        .into();
        return print_sku_listing(&catalog, listing_format(output));
    };

    let (document, current) = read_plan(&client, &resource).await?;
    let structured = OutputFormat::structured(output);
    if structured.is_none() {
        println!("Current: {}", describe_plan(&current));
    }

    let catalog: CatalogLookup<SkuCatalog> = fetch_sku_catalog(
        &client,
        &args.resource.resource_group,
        &args.plan_name,
    )
    .await
    .into();

    let request = PlanRequest {
        target_sku,
        capacity: args.capacity,
        auto_adjust: args.auto_adjust_capacity,
    };
    let resolved = resolve_plan_target(&request, &current, &catalog)?;
    debug!("Resolved plan target: {:?}", resolved);
    if structured.is_none() {
        println!("Target:  {}", describe_target(&resolved.target));
        print_resolution(&resolved);
    }

    let options = apply_options(&args.resource, conn_mgr);
    let (spinner, on_progress) = progress_spinner(&options);
    let outcome = apply::apply_plan_change(
        &client,
        &resource,
        &document,
        &current,
        &resolved,
        options,
        on_progress,
    )
    .await;
    if let Some(pb) = spinner
        && !pb.is_finished()
    {
        pb.finish_and_clear();
    }
    let outcome = outcome?;
    info!("Plan {}: wrote update = {}", args.plan_name, outcome.wrote());

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
                format!("New SKU: {}", describe_plan(updated))
            });
            Ok(())
        }
    }
}

fn required_target_sku(args: &PlanArgs) -> CliResult<String> {
    args.target_sku
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ScaleError::Usage("--target-sku is required unless --list-skus is given".into())
                .into()
        })
}

/// Print selectable SKUs
///
/// An unavailable catalog is an error; an empty one is not.
fn print_sku_listing(catalog: &CatalogLookup<SkuCatalog>, format: OutputFormat) -> CliResult<()> {
    let catalog = match catalog {
        CatalogLookup::Available(catalog) => catalog,
        CatalogLookup::Unavailable { reason } => {
            debug!("SKU listing unavailable: {}", reason);
            return Err(AzScaleError::NothingToList(
                "No selectable SKU data available.".to_string(),
            ));
        }
    };

    match format {
        OutputFormat::Table if catalog.is_empty() => {
            println!("No selectable SKUs returned for this plan.");
            Ok(())
        }
        OutputFormat::Table => {
            println!("{}", sku_table(catalog));
            Ok(())
        }
        other => print_output(catalog.options(), other),
    }
}

fn describe_plan(state: &PlanState) -> String {
    let mut text = format!(
        "{} ({}), capacity {}",
        state.sku.name.as_deref().unwrap_or("unknown"),
        state.sku.tier.as_deref().unwrap_or("unknown tier"),
        state
            .sku
            .capacity
            .map_or_else(|| "unknown".to_string(), |c| c.to_string())
    );
    if let Some(location) = &state.location {
        text.push_str(&format!(" in {}", location));
    }
    text
}

fn describe_target(target: &PlanTarget) -> String {
    match &target.tier {
        Some(tier) => format!("{} ({}), capacity {}", target.sku_name, tier, target.capacity),
        None => format!("{}, capacity {}", target.sku_name, target.capacity),
    }
}
