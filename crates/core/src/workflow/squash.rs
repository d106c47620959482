//! SQUASH: collapse every pending change into one migration unit.

use tracing::{debug, info};

use crate::errors::MigrationError;
use crate::helper::{MigrationRequest, RunHelper};
use crate::models::{ChangeBatch, ChangesResponse, Metadata};
use crate::workflow::empty_change;
use crate::workflow::last_rev::resolve_last_rev;
use crate::workflow::RunSummary;

/// Commit message used for squashed imports.
pub const SQUASH_IMPORT_MESSAGE: &str = "Project import generated by revmigrate.\n";

pub(crate) fn run(helper: &dyn RunHelper) -> Result<RunSummary, MigrationError> {
    let resolved_ref = helper.resolved_ref().clone();
    let mut current = resolved_ref.clone();
    let mut last_rev = None;
    let mut detected = Vec::new();

    if is_history_supported(helper) {
        last_rev = resolve_last_rev(helper, helper.is_force())?;
        match helper.changes(last_rev.as_ref(), &current)? {
            ChangesResponse::Empty(reason) => {
                let warning =
                    empty_change::evaluate(reason, helper.is_force(), last_rev.as_ref(), &current)?;
                helper.console().warn(&warning);
            }
            ChangesResponse::Changes(changes) => detected = changes,
        }
    } else {
        debug!("history not supported, squashing without a change list");
    }

    // Squashed imports always use the default author.
    let metadata = Metadata::new(SQUASH_IMPORT_MESSAGE, helper.default_author());

    helper.validate_repo_in_last_rev_state(Some(&metadata))?;

    // Scope can depend on the change set, so filter with the scoped helper.
    let scoped = helper.for_changes(&detected)?;
    detected.retain(|change| !scoped.skip_change(change));

    // Prefer the newest change that touched the scope over the requested
    // ref, which may be unrelated.
    if let Some(last) = detected.last() {
        current = last.revision.clone();
    }
    let discovered = detected.len();

    if helper.is_squash_without_history() {
        detected.clear();
    }

    // Writers expect the newest change first.
    detected.reverse();

    info!(
        current = %current,
        last_rev = ?last_rev.as_ref().map(|r| r.to_string()),
        changes = discovered,
        "squashing changes into one migration"
    );

    scoped.migrate(MigrationRequest {
        revision: current,
        last_rev,
        console: helper.console(),
        metadata,
        changes: ChangeBatch::new(detected, Vec::new()),
        baseline: None,
        identity_revision: resolved_ref,
    })?;

    Ok(RunSummary {
        migration_units: 1,
        changes_discovered: discovered,
    })
}

fn is_history_supported(helper: &dyn RunHelper) -> bool {
    helper.destination_supports_previous_ref() && helper.origin_reader().supports_history()
}
