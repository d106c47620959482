//! In-memory origin and destination driven by a [`ReplayFixture`].
//!
//! [`ReplayRepository`] implements every collaborator trait a workflow mode
//! needs, so a mode can be exercised end to end without a version-control
//! system. Migrations append commits to the in-memory destination; read them
//! back with [`ReplayRepository::destination_commits`].

pub mod fixture;

use std::cell::RefCell;
use std::collections::HashSet;
use std::ops::ControlFlow;

use glob_match::glob_match;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{WorkflowOptions, FORCE_FLAG};
use crate::console::Console;
use crate::errors::{MigrationError, ReplayError};
use crate::helper::{DestinationWriter, MigrationRequest, OriginReader, RunHelper, ScopedMigrator};
use crate::models::{
    Author, Baseline, Change, ChangesResponse, DestinationEffect, EffectKind, EmptyReason,
    Labels, Metadata,
};
use crate::revision::{canonical_revision_id, Revision};

pub use fixture::{ReplayFixture, DEFAULT_ORIGIN_LABEL};

/// A commit in the replay destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationCommit {
    pub id: String,
    pub message: String,
    pub author: Author,
    pub labels: Labels,
    /// Destination commit a change request was created against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
    /// Origin revision identifying the migration unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Origin changes folded into this commit, newest first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub origin_changes: Vec<String>,
}

impl DestinationCommit {
    fn to_change(&self) -> Change {
        let mut change = Change::new(
            Revision::new(self.id.clone()),
            self.message.clone(),
            self.author.clone(),
        );
        change.labels = self.labels.clone();
        change
    }
}

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

struct ReplayOrigin {
    supports_history: bool,
    /// Oldest first.
    changes: Vec<Change>,
    scope: Vec<String>,
}

impl ReplayOrigin {
    fn position(&self, revision: &Revision) -> Option<usize> {
        self.changes.iter().position(|c| c.revision == *revision)
    }

    fn require(&self, revision: &Revision) -> Result<usize, ReplayError> {
        self.position(revision)
            .ok_or_else(|| ReplayError::UnknownRevision(revision.to_string()))
    }

    /// A change without a file list touches every path.
    fn touches_scope(&self, change: &Change) -> bool {
        change.files.is_empty()
            || change
                .files
                .iter()
                .any(|file| self.scope.iter().any(|pattern| glob_match(pattern, file)))
    }
}

impl OriginReader for ReplayOrigin {
    fn supports_history(&self) -> bool {
        self.supports_history
    }

    fn find_baseline(
        &self,
        start: &Revision,
        label: &str,
    ) -> Result<Option<Baseline>, MigrationError> {
        let idx = self.require(start)?;
        let found = self.changes[..=idx].iter().rev().find_map(|change| {
            change
                .labels
                .get_all(label)
                .next()
                .map(|value| Baseline::new(value, Some(change.revision.clone())))
        });
        debug!(start = %start, label, found = found.is_some(), "origin baseline lookup");
        Ok(found)
    }

    fn find_baselines_without_label(
        &self,
        start: &Revision,
        limit: usize,
    ) -> Result<Vec<Revision>, MigrationError> {
        let idx = self.require(start)?;
        Ok(self.changes[..idx]
            .iter()
            .rev()
            .take(limit)
            .map(|c| c.revision.clone())
            .collect())
    }

    fn change(&self, revision: &Revision) -> Result<Change, MigrationError> {
        let idx = self.require(revision)?;
        Ok(self.changes[idx].clone())
    }

    fn changes(
        &self,
        from: Option<&Revision>,
        to: &Revision,
    ) -> Result<ChangesResponse, MigrationError> {
        let to_idx = self.require(to)?;
        let start = match from {
            None => 0,
            Some(from) => match self.position(from) {
                None => return Ok(ChangesResponse::no_changes(EmptyReason::UnrelatedRevisions)),
                Some(idx) if idx >= to_idx => {
                    return Ok(ChangesResponse::no_changes(EmptyReason::ToIsAncestor))
                }
                Some(idx) => idx + 1,
            },
        };
        let changes = self.changes[start..=to_idx]
            .iter()
            .filter(|c| self.touches_scope(c))
            .cloned()
            .collect();
        Ok(ChangesResponse::for_changes(changes))
    }
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

struct ReplayDestination {
    supports_history: bool,
    origin_label: String,
    reject: HashSet<String>,
    /// Oldest first.
    commits: RefCell<Vec<DestinationCommit>>,
}

impl ReplayDestination {
    /// Origin label value of the newest labelled commit.
    fn last_origin_revision(&self) -> Option<String> {
        self.commits.borrow().iter().rev().find_map(|c| {
            c.labels
                .get_all(&self.origin_label)
                .next()
                .map(str::to_string)
        })
    }

    /// Whether the newest commit on the `baseline` line already carries
    /// `origin_revision`.
    fn mirrors(&self, origin_revision: &str, baseline: Option<&str>) -> bool {
        self.commits
            .borrow()
            .iter()
            .rev()
            .filter(|c| c.baseline.as_deref() == baseline)
            .find_map(|c| c.labels.get_all(&self.origin_label).next().map(str::to_string))
            .is_some_and(|value| canonical_revision_id(&value) == origin_revision)
    }

    fn next_id(&self) -> String {
        let commits = self.commits.borrow();
        let mut n = commits.len() + 1;
        loop {
            let id = format!("d{}", n);
            if !commits.iter().any(|c| c.id == id) {
                return id;
            }
            n += 1;
        }
    }
}

impl DestinationWriter for ReplayDestination {
    fn supports_history(&self) -> bool {
        self.supports_history
    }

    fn label_name_when_origin(&self) -> String {
        self.origin_label.clone()
    }

    fn visit_changes_with_any_label(
        &self,
        start: Option<&Revision>,
        label_names: &[String],
        visitor: &mut dyn FnMut(&Change, &Labels) -> ControlFlow<String>,
    ) -> Result<Option<String>, MigrationError> {
        let commits = self.commits.borrow();
        let skip = match start {
            None => 0,
            Some(start) => commits
                .iter()
                .rev()
                .position(|c| c.id == start.as_str())
                .ok_or_else(|| MigrationError::CannotResolveRevision(start.to_string()))?,
        };

        for commit in commits.iter().rev().skip(skip) {
            let matched = commit.labels.matching_any(label_names);
            if matched.is_empty() {
                continue;
            }
            if let ControlFlow::Break(value) = visitor(&commit.to_change(), &matched) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Origin, destination and run context for one replayed workflow run.
pub struct ReplayRepository {
    origin: ReplayOrigin,
    destination: ReplayDestination,
    resolved: Revision,
    options: WorkflowOptions,
    squash_without_history: bool,
    default_author: Author,
    console: Box<dyn Console>,
}

impl ReplayRepository {
    pub fn new(
        fixture: ReplayFixture,
        options: WorkflowOptions,
        console: Box<dyn Console>,
    ) -> Result<Self, ReplayError> {
        fixture.validate()?;

        let changes: Vec<Change> = fixture
            .origin
            .changes
            .iter()
            .map(|c| c.to_change())
            .collect();
        let resolved = match &fixture.requested {
            Some(id) => Revision::new(id.clone()),
            None => changes
                .last()
                .map(|c| c.revision.clone())
                .ok_or_else(|| ReplayError::Invalid("origin has no changes".into()))?,
        };
        let commits = fixture
            .destination
            .commits
            .into_iter()
            .map(|c| DestinationCommit {
                id: c.id,
                message: c.message,
                author: c.author,
                labels: c.labels,
                baseline: None,
                identity: None,
                origin_changes: Vec::new(),
            })
            .collect();

        info!(
            origin_changes = changes.len(),
            resolved = %resolved,
            "replay repository ready"
        );

        Ok(Self {
            origin: ReplayOrigin {
                supports_history: fixture.origin.supports_history,
                changes,
                scope: fixture.origin_files,
            },
            destination: ReplayDestination {
                supports_history: fixture.destination.supports_history,
                origin_label: fixture.destination.origin_label,
                reject: fixture
                    .destination
                    .reject
                    .iter()
                    .map(|r| canonical_revision_id(r).to_string())
                    .collect(),
                commits: RefCell::new(commits),
            },
            resolved,
            options,
            squash_without_history: false,
            default_author: fixture.default_author,
            console,
        })
    }

    /// Migrate `reference` instead of the fixture's requested change.
    pub fn with_requested_ref(mut self, reference: &str) -> Result<Self, ReplayError> {
        let idx = self.origin.require(&Revision::new(reference))?;
        self.resolved = self.origin.changes[idx].revision.clone();
        Ok(self)
    }

    pub fn with_squash_without_history(mut self, enabled: bool) -> Self {
        self.squash_without_history = enabled;
        self
    }

    /// Destination commits, oldest first.
    pub fn destination_commits(&self) -> Vec<DestinationCommit> {
        self.destination.commits.borrow().clone()
    }
}

impl RunHelper for ReplayRepository {
    fn resolved_ref(&self) -> &Revision {
        &self.resolved
    }

    fn last_rev(&self) -> Result<Revision, MigrationError> {
        self.destination
            .last_origin_revision()
            .map(Revision::new)
            .ok_or_else(|| {
                MigrationError::CannotResolveRevision(format!(
                    "no destination commit carries the {} label",
                    self.destination.origin_label
                ))
            })
    }

    fn changes(
        &self,
        from: Option<&Revision>,
        to: &Revision,
    ) -> Result<ChangesResponse, MigrationError> {
        self.origin.changes(from, to)
    }

    /// The destination head must have been written by a migration unless
    /// the run is forced.
    fn validate_repo_in_last_rev_state(
        &self,
        metadata: Option<&Metadata>,
    ) -> Result<(), MigrationError> {
        let commits = self.destination.commits.borrow();
        let Some(head) = commits.last() else {
            return Ok(());
        };
        if head.labels.get_all(&self.destination.origin_label).next().is_some() {
            return Ok(());
        }
        if self.is_force() {
            warn!(head = %head.id, "destination head was not written by a migration");
            return Ok(());
        }
        debug!(message = ?metadata.map(|m| m.message.as_str()), "validation failed");
        Err(MigrationError::validation(format!(
            "Destination head {} has no {} label, so it was not created by a migration. Use {} \
             to migrate on top of it anyway",
            head.id, self.destination.origin_label, FORCE_FLAG
        )))
    }

    fn for_changes(
        &self,
        changes: &[Change],
    ) -> Result<Box<dyn ScopedMigrator + '_>, MigrationError> {
        debug!(changes = changes.len(), "scoping replay helper");
        Ok(Box::new(ReplayScope { repo: self }))
    }

    fn origin_reader(&self) -> &dyn OriginReader {
        &self.origin
    }

    fn destination_writer(&self) -> &dyn DestinationWriter {
        &self.destination
    }

    fn console(&self) -> &dyn Console {
        self.console.as_ref()
    }

    fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    fn is_squash_without_history(&self) -> bool {
        self.squash_without_history
    }

    fn default_author(&self) -> Author {
        self.default_author.clone()
    }

    fn origin_resolve(&self, reference: &str) -> Result<Revision, MigrationError> {
        let idx = self.origin.require(&Revision::new(reference))?;
        Ok(self.origin.changes[idx].revision.clone())
    }

    fn origin_files(&self) -> String {
        format!("glob({:?})", self.origin.scope)
    }
}

struct ReplayScope<'a> {
    repo: &'a ReplayRepository,
}

impl ScopedMigrator for ReplayScope<'_> {
    fn skip_change(&self, change: &Change) -> bool {
        !self.repo.origin.touches_scope(change)
    }

    fn migrate(
        &self,
        request: MigrationRequest<'_>,
    ) -> Result<Vec<DestinationEffect>, MigrationError> {
        let destination = &self.repo.destination;
        let origin_revision = request.revision.canonical_id().to_string();
        let baseline = request.baseline.as_ref().map(|b| b.baseline.as_str());

        if destination.mirrors(&origin_revision, baseline) {
            return Err(MigrationError::empty_change(format!(
                "destination already contains origin revision {}",
                request.revision
            )));
        }

        if destination.reject.contains(&origin_revision) {
            request.console.warn(&format!(
                "Destination checks failed for origin revision {}",
                request.revision
            ));
            return Ok(vec![DestinationEffect::new(
                EffectKind::Error,
                format!("Destination rejected {}", request.revision),
            )
            .with_errors(vec![format!(
                "presubmit failed for {}",
                request.revision
            )])]);
        }

        let mut labels = request.metadata.labels.clone();
        labels.insert(destination.origin_label.clone(), request.revision.as_str());
        let commit = DestinationCommit {
            id: destination.next_id(),
            message: request.metadata.message.trim_end().to_string(),
            author: request.metadata.author.clone(),
            labels,
            baseline: baseline.map(str::to_string),
            identity: Some(request.identity_revision.as_str().to_string()),
            origin_changes: request
                .changes
                .current
                .iter()
                .map(|c| c.revision.as_str().to_string())
                .collect(),
        };
        let id = commit.id.clone();
        destination.commits.borrow_mut().push(commit);

        request.console.info(&format!(
            "Created destination commit {} for origin revision {}",
            id, request.revision
        ));
        Ok(vec![DestinationEffect::new(
            EffectKind::Created,
            format!("Created {} from {}", id, request.revision),
        )
        .with_destination_ref(id)])
    }
}
