//! What SQUASH does when the change range is empty.
//!
//! | Reason | without `--force` | with `--force` |
//! |--------|-------------------|----------------|
//! | `NO_CHANGES` | empty-change failure | warn, migrate an empty change set |
//! | `TO_IS_ANCESTOR` | empty-change failure | warn, migrate again |
//! | `UNRELATED_REVISIONS` | validation failure | warn, migrate anyway |
//!
//! ITERATIVE and the change-request modes never consult this policy.

use crate::config::FORCE_FLAG;
use crate::errors::MigrationError;
use crate::models::EmptyReason;
use crate::revision::Revision;

/// Decide whether SQUASH may proceed with an empty change range.
///
/// Returns the warning to show the operator when the run proceeds.
pub fn evaluate(
    reason: EmptyReason,
    force: bool,
    last_rev: Option<&Revision>,
    current: &Revision,
) -> Result<String, MigrationError> {
    let last = last_rev.map(Revision::as_str).unwrap_or("<none>");
    match reason {
        EmptyReason::NoChanges => {
            let from = last_rev
                .map(|rev| format!(" from {}", rev))
                .unwrap_or_default();
            let message = format!("No changes{} up to {} match any origin_files", from, current);
            if !force {
                return Err(MigrationError::empty_change(format!(
                    "{}. Use {} if you really want to run the migration anyway.",
                    message, FORCE_FLAG
                )));
            }
            Ok(format!("{}. Migrating anyway because of {}", message, FORCE_FLAG))
        }
        EmptyReason::ToIsAncestor => {
            if !force {
                return Err(MigrationError::empty_change(format!(
                    "'{}' has been already migrated. Use {} if you really want to run the \
                     migration again (for example if the workflow configuration has changed).",
                    current, FORCE_FLAG
                )));
            }
            Ok(format!(
                "'{}' has been already migrated. Migrating anyway because of {}",
                last, FORCE_FLAG
            ))
        }
        EmptyReason::UnrelatedRevisions => {
            let message = format!(
                "Last imported revision '{}' is not an ancestor of the revision currently being \
                 migrated ('{}')",
                last, current
            );
            if !force {
                return Err(MigrationError::validation(format!(
                    "{}. Use {} if you really want to migrate the reference.",
                    message, FORCE_FLAG
                )));
            }
            Ok(message)
        }
    }
}
