//! ITERATIVE: replay each pending change as its own migration unit.
//!
//! The loop is not transactional across changes. A failure after N
//! successful migrations leaves those N in the destination, so a later run
//! resumes from there. When a migration reports destination errors the
//! operator decides whether to keep going.

use std::collections::VecDeque;

use tracing::{debug, info, info_span};

use crate::console::PrefixedConsole;
use crate::errors::MigrationError;
use crate::helper::{MigrationRequest, RunHelper};
use crate::models::{Change, ChangeBatch, ChangesResponse, EmptyReason, Metadata};
use crate::revision::Revision;
use crate::workflow::RunSummary;

/// Result of attempting a single change.
enum Attempt {
    Skipped,
    Empty,
    Migrated { errors: bool },
}

pub(crate) fn run(helper: &dyn RunHelper) -> Result<RunSummary, MigrationError> {
    let resolved_ref = helper.resolved_ref().clone();
    let last_rev = helper.last_rev()?;

    let changes = match helper.changes(Some(&last_rev), &resolved_ref)? {
        ChangesResponse::Changes(changes) => changes,
        ChangesResponse::Empty(EmptyReason::UnrelatedRevisions) => {
            return Err(MigrationError::validation(format!(
                "last imported revision {} is not ancestor of requested revision {}",
                last_rev, resolved_ref
            )));
        }
        ChangesResponse::Empty(_) => {
            return Err(MigrationError::empty_change(format!(
                "No new changes to import for resolved ref: {}",
                resolved_ref
            )));
        }
    };

    let total = changes.len();
    let limit = helper.options().iterative_limit().min(total);
    if limit < total {
        helper.console().info(&format!(
            "Importing first {} change(s) out of {}",
            limit, total
        ));
    }

    helper.validate_repo_in_last_rev_state(None)?;

    let mut migrated: VecDeque<Change> = VecDeque::new();
    let mut migrated_count = 0;
    let mut change_number = 1;
    let mut remaining = changes.iter().peekable();

    while migrated_count < limit {
        let Some(change) = remaining.next() else {
            break;
        };
        let prefix = format!(
            "Change {} of {} ({}): ",
            change_number, limit, change.revision
        );

        let attempt = {
            let _span = info_span!("migrate_change", change = %change.revision.reference()).entered();
            migrate_one(helper, change, &last_rev, &migrated, &prefix)
        };

        let errors = match attempt {
            Ok(Attempt::Skipped) => {
                debug!(revision = %change.revision, "change does not touch the scope, skipping");
                continue;
            }
            Ok(Attempt::Migrated { errors }) => {
                migrated_count += 1;
                errors
            }
            Ok(Attempt::Empty) => false,
            Err(e) => {
                helper.console().error(&format!(
                    "Migration of origin revision '{}' failed with error: {}",
                    change.revision, e
                ));
                return Err(e);
            }
        };

        migrated.push_front(change.clone());

        if errors
            && remaining.peek().is_some()
            && !helper
                .console()
                .prompt_confirmation("Continue importing next change?")?
        {
            let message = format!("Iterative workflow aborted by user after: {}", prefix);
            helper.console().warn(&message);
            return Err(MigrationError::ChangeRejected(message));
        }
        change_number += 1;
    }

    if migrated_count == 0 {
        return Err(MigrationError::empty_change(format!(
            "Iterative workflow produced no changes in the destination for resolved ref: {}",
            resolved_ref
        )));
    }

    info!(
        migrated = migrated_count,
        total,
        "Imported {} change(s) out of {}",
        migrated_count,
        total
    );
    Ok(RunSummary {
        migration_units: migrated_count,
        changes_discovered: total,
    })
}

fn migrate_one(
    helper: &dyn RunHelper,
    change: &Change,
    last_rev: &Revision,
    migrated: &VecDeque<Change>,
    prefix: &str,
) -> Result<Attempt, MigrationError> {
    let current = std::slice::from_ref(change);
    let scoped = helper.for_changes(current)?;
    if scoped.skip_change(change) {
        return Ok(Attempt::Skipped);
    }

    let console = PrefixedConsole::new(prefix, helper.console());
    let request = MigrationRequest {
        revision: change.revision.clone(),
        last_rev: Some(last_rev.clone()),
        console: &console,
        metadata: Metadata::new(change.message.clone(), change.author.clone()),
        changes: ChangeBatch::new(current.to_vec(), migrated.iter().cloned().collect()),
        baseline: None,
        // Each change gets its own identity so destinations can open one
        // review per change.
        identity_revision: change.revision.clone(),
    };

    match scoped.migrate(request) {
        Ok(effects) => Ok(Attempt::Migrated {
            errors: effects.iter().any(|e| e.has_reportable_errors()),
        }),
        Err(MigrationError::EmptyChange(detail)) => {
            helper.console().warn(&format!(
                "Migration of origin revision '{}' resulted in an empty change in the \
                 destination: {}",
                change.revision, detail
            ));
            Ok(Attempt::Empty)
        }
        Err(e) => Err(e),
    }
}
