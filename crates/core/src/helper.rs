//! Collaborator interfaces consumed by the workflow modes.
//!
//! Workflow modes never talk to a version-control system directly. A
//! [`RunHelper`] bundles everything one run needs: the resolved reference,
//! change-range queries, the origin reader, the destination writer, the
//! operator console and the options. Concrete connectors implement these
//! traits; [`crate::replay`] provides an in-memory implementation.

use std::ops::ControlFlow;

use crate::config::WorkflowOptions;
use crate::console::Console;
use crate::errors::MigrationError;
use crate::models::{
    Author, Baseline, Change, ChangeBatch, ChangesResponse, DestinationEffect, Labels, Metadata,
};
use crate::revision::Revision;

/// Everything the writer needs for one migration unit.
pub struct MigrationRequest<'a> {
    /// Origin revision whose state is migrated.
    pub revision: Revision,
    /// Last revision already present in the destination, if known.
    pub last_rev: Option<Revision>,
    /// Console for this unit; may carry a progress prefix.
    pub console: &'a dyn Console,
    pub metadata: Metadata,
    pub changes: ChangeBatch,
    /// Destination baseline for change-request modes.
    pub baseline: Option<Baseline>,
    /// Revision that identifies this unit in the destination (e.g. which
    /// review to create or update).
    pub identity_revision: Revision,
}

/// A run helper narrowed to a particular set of changes. File scope can
/// depend on the change set, so filtering and migration go through it.
pub trait ScopedMigrator {
    /// `true` when `change` touches nothing in scope.
    fn skip_change(&self, change: &Change) -> bool;

    /// Write one migration unit to the destination.
    ///
    /// Fails with [`MigrationError::EmptyChange`] when the unit would not
    /// change the destination.
    fn migrate(
        &self,
        request: MigrationRequest<'_>,
    ) -> Result<Vec<DestinationEffect>, MigrationError>;
}

/// Read access to the origin repository.
pub trait OriginReader {
    /// Whether the origin can enumerate history between two revisions.
    fn supports_history(&self) -> bool;

    /// Find a baseline for `start` by looking through its ancestry for a
    /// change carrying `label`.
    fn find_baseline(
        &self,
        start: &Revision,
        label: &str,
    ) -> Result<Option<Baseline>, MigrationError>;

    /// Up to `limit` candidate baselines for `start` that do not rely on a
    /// label. Callers try them in the returned order.
    fn find_baselines_without_label(
        &self,
        start: &Revision,
        limit: usize,
    ) -> Result<Vec<Revision>, MigrationError>;

    /// The single change at `revision`.
    fn change(&self, revision: &Revision) -> Result<Change, MigrationError>;

    /// Changes after `from` up to and including `to`, oldest first.
    fn changes(
        &self,
        from: Option<&Revision>,
        to: &Revision,
    ) -> Result<ChangesResponse, MigrationError>;
}

/// Read-side operations of the destination writer.
pub trait DestinationWriter {
    /// Whether the destination records a link to the previously migrated
    /// revision.
    fn supports_history(&self) -> bool;

    /// Label name the destination uses to record the origin revision.
    fn label_name_when_origin(&self) -> String;

    /// Visit destination changes carrying any of `label_names`, newest
    /// first, starting at `start` (or the current head when `None`).
    ///
    /// `visitor` receives each change and the subset of its labels that
    /// matched. Returning `ControlFlow::Break(value)` stops the walk and the
    /// value is returned; `Ok(None)` means the walk finished.
    fn visit_changes_with_any_label(
        &self,
        start: Option<&Revision>,
        label_names: &[String],
        visitor: &mut dyn FnMut(&Change, &Labels) -> ControlFlow<String>,
    ) -> Result<Option<String>, MigrationError>;
}

/// Per-run context handed to a workflow mode.
pub trait RunHelper {
    /// The origin revision the operator asked to migrate.
    fn resolved_ref(&self) -> &Revision;

    /// Last origin revision already migrated to the destination.
    ///
    /// Fails with [`MigrationError::CannotResolveRevision`] when there is
    /// none (e.g. the first import).
    fn last_rev(&self) -> Result<Revision, MigrationError>;

    /// Changes after `from` up to `to` that touch the configured scope.
    fn changes(
        &self,
        from: Option<&Revision>,
        to: &Revision,
    ) -> Result<ChangesResponse, MigrationError>;

    /// Check that the destination is in the state the last migration left
    /// it in.
    fn validate_repo_in_last_rev_state(
        &self,
        metadata: Option<&Metadata>,
    ) -> Result<(), MigrationError>;

    /// Derive a helper scoped to `changes`.
    fn for_changes(
        &self,
        changes: &[Change],
    ) -> Result<Box<dyn ScopedMigrator + '_>, MigrationError>;

    fn origin_reader(&self) -> &dyn OriginReader;

    fn destination_writer(&self) -> &dyn DestinationWriter;

    fn console(&self) -> &dyn Console;

    fn options(&self) -> &WorkflowOptions;

    /// SQUASH drops the detected change list when this is set.
    fn is_squash_without_history(&self) -> bool;

    /// Author used for squashed imports.
    fn default_author(&self) -> Author;

    /// Resolve an operator-supplied reference in the origin.
    fn origin_resolve(&self, reference: &str) -> Result<Revision, MigrationError>;

    /// Human-readable description of the origin file scope.
    fn origin_files(&self) -> String;

    fn is_force(&self) -> bool {
        self.options().force
    }

    fn destination_supports_previous_ref(&self) -> bool {
        self.destination_writer().supports_history()
    }

    fn origin_label_name(&self) -> String {
        self.destination_writer().label_name_when_origin()
    }
}
