//! Resolution of the last migrated revision for SQUASH.

use tracing::debug;

use crate::config::FORCE_FLAG;
use crate::errors::MigrationError;
use crate::helper::RunHelper;
use crate::revision::Revision;

/// Returns the last migrated revision, or `None` when it cannot be
/// determined and `force` is set.
///
/// Without `force` an unresolvable last revision becomes a validation error
/// telling the operator about the flag. Other failures propagate unchanged.
pub fn resolve_last_rev(
    helper: &dyn RunHelper,
    force: bool,
) -> Result<Option<Revision>, MigrationError> {
    match helper.last_rev() {
        Ok(rev) => {
            debug!(last_rev = %rev, "resolved last migrated revision");
            Ok(Some(rev))
        }
        Err(MigrationError::CannotResolveRevision(detail)) => {
            if force {
                helper.console().warn(&format!(
                    "Cannot find last imported revision, but proceeding because of {} flag",
                    FORCE_FLAG
                ));
                Ok(None)
            } else {
                Err(MigrationError::validation(format!(
                    "Cannot find last imported revision ({}). Use {} if you really want to \
                     proceed with the migration",
                    detail, FORCE_FLAG
                )))
            }
        }
        Err(other) => Err(other),
    }
}
