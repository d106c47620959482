//! CHANGE_REQUEST and CHANGE_REQUEST_FROM_SOT.
//!
//! Both modes resolve a baseline in the destination and migrate the origin
//! changes between that baseline and the resolved ref as a single unit.

use tracing::{debug, info};

use crate::config::{CHANGE_REQUEST_FROM_SOT_LIMIT_FLAG, CHANGE_REQUEST_PARENT_FLAG};
use crate::errors::{check_condition, MigrationError};
use crate::helper::{MigrationRequest, RunHelper};
use crate::models::{Baseline, ChangeBatch, ChangesResponse, Metadata};
use crate::revision::Revision;
use crate::workflow::baseline_lookup::{DestinationBaselineLookup, Sleeper};
use crate::workflow::{RunSummary, WorkflowMode};

/// CHANGE_REQUEST: baseline from the operator, or from the origin label.
pub(crate) fn run(helper: &dyn RunHelper) -> Result<RunSummary, MigrationError> {
    check_condition(
        helper.destination_supports_previous_ref(),
        format!(
            "'{}' is incompatible with destinations that don't support history \
             (for example a plain folder destination)",
            WorkflowMode::ChangeRequest
        ),
    )?;

    let baseline = match helper.options().change_baseline() {
        Some(parent) => Some(Baseline::new(parent, None)),
        None => {
            let origin_label = helper.origin_label_name();
            helper
                .origin_reader()
                .find_baseline(helper.resolved_ref(), &origin_label)?
        }
    };

    run_change_request(helper, baseline)
}

/// CHANGE_REQUEST_FROM_SOT: the newest origin ancestor that already has a
/// labelled counterpart in the destination.
pub(crate) fn run_from_sot(
    helper: &dyn RunHelper,
    sleeper: &dyn Sleeper,
) -> Result<RunSummary, MigrationError> {
    let candidates = match helper.options().change_baseline() {
        Some(parent) => vec![helper.origin_resolve(parent)?],
        None => helper.origin_reader().find_baselines_without_label(
            helper.resolved_ref(),
            helper.options().from_sot_limit(),
        )?,
    };
    debug!(candidates = candidates.len(), "candidate origin baselines");

    let lookup = DestinationBaselineLookup::new(helper, sleeper);
    let mut last_tried: Option<Revision> = None;
    for candidate in candidates {
        let origin_revision = candidate.canonical_id().to_string();
        if let Some(destination_baseline) = lookup.lookup_with_retry(&origin_revision)? {
            return run_change_request(
                helper,
                Some(Baseline::new(destination_baseline, Some(candidate))),
            );
        }
        last_tried = Some(candidate);
    }

    Err(MigrationError::retryable_validation(format!(
        "Couldn't find a change in the destination with {} label and {} value. Make sure to \
         sync the submitted changes from the origin -> destination first or use SQUASH mode \
         or use {}",
        helper.origin_label_name(),
        last_tried
            .as_ref()
            .map(Revision::as_str)
            .unwrap_or("<no candidate baseline>"),
        CHANGE_REQUEST_FROM_SOT_LIMIT_FLAG
    )))
}

/// Shared tail: migrate the changes since `baseline` as one unit.
fn run_change_request(
    helper: &dyn RunHelper,
    baseline: Option<Baseline>,
) -> Result<RunSummary, MigrationError> {
    let Some(baseline) = baseline else {
        return Err(MigrationError::validation(format!(
            "Cannot find matching parent commit in the destination. Use '{}' flag to force a \
             parent commit to use as baseline in the destination.",
            CHANGE_REQUEST_PARENT_FLAG
        )));
    };
    info!(baseline = %baseline.baseline, "found baseline");

    let resolved_ref = helper.resolved_ref().clone();

    // With an explicit baseline nothing is known about the origin changes in
    // the request, so the resolved change is assumed to be the only one.
    let changes = match &baseline.origin_revision {
        None => vec![helper.origin_reader().change(&resolved_ref)?],
        Some(origin_revision) => {
            match helper
                .origin_reader()
                .changes(Some(origin_revision), &resolved_ref)?
            {
                ChangesResponse::Changes(changes) => changes,
                ChangesResponse::Empty(reason) => {
                    debug!(%reason, "no changes between baseline and resolved ref");
                    return Err(MigrationError::empty_change(format!(
                        "Change '{}' doesn't include any change for origin_files = {}",
                        resolved_ref,
                        helper.origin_files()
                    )));
                }
            }
        }
    };

    let Some(last) = changes.last() else {
        return Err(MigrationError::empty_change(format!(
            "Change '{}' doesn't include any change for origin_files = {}",
            resolved_ref,
            helper.origin_files()
        )));
    };
    // The newest change provides message and author.
    let metadata = Metadata::new(last.message.clone(), last.author.clone());

    let scoped = helper.for_changes(&changes)?;
    let discovered = changes.len();
    let mut current = changes;
    current.reverse();

    scoped.migrate(MigrationRequest {
        revision: resolved_ref.clone(),
        last_rev: None,
        console: helper.console(),
        metadata,
        changes: ChangeBatch::new(current, Vec::new()),
        baseline: Some(baseline),
        identity_revision: resolved_ref,
    })?;

    Ok(RunSummary {
        migration_units: 1,
        changes_discovered: discovered,
    })
}
