//! Scaling commands
//!
//! Both commands print the same way: current state, the resolved target,
//! any adjustments, then the outcome. Structured output (`-o json|yaml`)
//! replaces all of that with one [`ScaleReport`].

pub mod plan;
pub mod pool;

use azscale_core::{
    ApplyOptions, ApplyOutcome, FieldChange, ProgressCallback, ProgressEvent,
    Provenance, ResolvedTarget,
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::cli::{self, ResourceArgs};
use crate::connection::ConnectionManager;
use crate::output::OutputFormat;

/// Everything one scaling run did, for `-o json|yaml|table`
#[derive(Debug, Serialize)]
pub struct ScaleReport<'a, C, T, S> {
    pub resource: String,
    pub current: &'a C,
    pub resolved: &'a ResolvedTarget<T>,
    pub result: &'a ApplyOutcome<S>,
}

/// Dry-run and wait settings for this invocation
pub fn apply_options(args: &ResourceArgs, conn_mgr: &ConnectionManager) -> ApplyOptions {
    ApplyOptions {
        dry_run: args.dry_run,
        wait: (!args.no_wait).then(|| conn_mgr.wait_options()),
    }
}

/// Spinner on stderr that follows the polling progress
///
/// Returns no callback for dry runs and no-wait runs, which never poll.
pub fn progress_spinner(options: &ApplyOptions) -> (Option<ProgressBar>, Option<ProgressCallback>) {
    if options.dry_run || options.wait.is_none() {
        return (None, None);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let pb_clone = pb.clone();
    let callback = Box::new(move |event: ProgressEvent| match event {
        ProgressEvent::Started { operation } => {
            pb_clone.set_message(format!("Updating {}", operation));
        }
        ProgressEvent::Polling {
            operation, status, ..
        } => {
            pb_clone.enable_steady_tick(std::time::Duration::from_millis(120));
            pb_clone.set_message(format!("Updating {}: {}", operation, status));
        }
        ProgressEvent::Completed { operation } => {
            pb_clone.finish_with_message(format!("Updated {}", operation));
        }
        ProgressEvent::Failed { operation, error } => {
            pb_clone.finish_with_message(format!("Update of {} failed: {}", operation, error));
        }
    }) as ProgressCallback;

    (Some(pb), Some(callback))
}

/// Warnings and adjustment notes for a resolved target
///
/// Unvalidated targets go to stderr; adjustments are part of the normal output.
pub fn print_resolution<T>(resolved: &ResolvedTarget<T>) {
    if let Provenance::Unvalidated { reason } = &resolved.provenance {
        eprintln!(
            "{} capabilities unavailable ({}); sending the request unvalidated",
            "warning:".yellow().bold(),
            reason
        );
    }
    for adjustment in &resolved.adjustments {
        println!(
            "Adjusted {}: {} -> {}",
            adjustment.field, adjustment.requested, adjustment.resolved
        );
    }
}

fn print_changes(changes: &[FieldChange]) {
    for change in changes {
        println!(
            "  {}: {} -> {}",
            change.field,
            change.current.as_deref().unwrap_or("unknown"),
            change.desired
        );
    }
}

/// Human-readable outcome; `done` renders the state read back after a wait
pub fn print_outcome<S>(outcome: &ApplyOutcome<S>, done: impl Fn(&S) -> String) {
    match outcome {
        ApplyOutcome::NoChange => println!("No change needed."),
        ApplyOutcome::DryRun { changes } => {
            println!("Changes:");
            print_changes(changes);
            println!("Dry run: not applying changes.");
        }
        ApplyOutcome::Started { changes } => {
            println!("Changes:");
            print_changes(changes);
            println!("Update started (no-wait).");
        }
        ApplyOutcome::Completed { changes, updated } => {
            println!("Changes:");
            print_changes(changes);
            println!("Done. {}", done(updated));
        }
    }
}

/// Listings default to a table; `-o json|yaml` prints the options instead
pub fn listing_format(format: cli::OutputFormat) -> OutputFormat {
    OutputFormat::structured(format).unwrap_or(OutputFormat::Table)
}
