//! In-memory collaborators for workflow unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::ControlFlow;
use std::time::Duration;

use crate::config::WorkflowOptions;
use crate::console::Console;
use crate::errors::{ErrorKind, MigrationError};
use crate::helper::{DestinationWriter, MigrationRequest, OriginReader, RunHelper, ScopedMigrator};
use crate::models::{
    Author, Baseline, Change, ChangeBatch, ChangesResponse, DestinationEffect, EffectKind,
    EmptyReason, Labels, Metadata,
};
use crate::revision::Revision;
use crate::workflow::baseline_lookup::{Interrupted, Sleeper};

pub fn change(id: &str) -> Change {
    Change::new(
        Revision::new(id),
        format!("message for {}", id),
        Author::new("Origin Author", "origin@example.com"),
    )
}

pub fn ids(changes: &[Change]) -> Vec<&str> {
    changes.iter().map(|c| c.revision.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeConsole {
    infos: RefCell<Vec<String>>,
    warnings: RefCell<Vec<String>>,
    errors: RefCell<Vec<String>>,
    prompts: RefCell<Vec<String>>,
    answers: RefCell<VecDeque<bool>>,
}

impl FakeConsole {
    pub fn infos(&self) -> Vec<String> {
        self.infos.borrow().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Console for FakeConsole {
    fn info(&self, message: &str) {
        self.infos.borrow_mut().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }

    /// Unanswered prompts are declined.
    fn prompt_confirmation(&self, message: &str) -> Result<bool, MigrationError> {
        self.prompts.borrow_mut().push(message.to_string());
        Ok(self.answers.borrow_mut().pop_front().unwrap_or(false))
    }
}

// ---------------------------------------------------------------------------
// Sleeper
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSleeper {
    slept: RefCell<Vec<Duration>>,
    interrupt: bool,
}

impl RecordingSleeper {
    pub fn interrupting() -> Self {
        Self {
            interrupt: true,
            ..Self::default()
        }
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }

    pub fn total(&self) -> Duration {
        self.slept.borrow().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.slept.borrow_mut().push(duration);
        if self.interrupt {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

pub struct FakeOrigin {
    pub supports_history: bool,
    baseline: Option<Baseline>,
    candidates: Vec<Revision>,
    known: HashMap<String, Change>,
    range: ChangesResponse,
    baseline_labels: RefCell<Vec<String>>,
    candidate_limits: RefCell<Vec<usize>>,
    range_queries: RefCell<Vec<(Option<String>, String)>>,
}

impl Default for FakeOrigin {
    fn default() -> Self {
        Self {
            supports_history: true,
            baseline: None,
            candidates: Vec::new(),
            known: HashMap::new(),
            range: ChangesResponse::no_changes(EmptyReason::NoChanges),
            baseline_labels: RefCell::default(),
            candidate_limits: RefCell::default(),
            range_queries: RefCell::default(),
        }
    }
}

impl FakeOrigin {
    pub fn baseline_labels(&self) -> Vec<String> {
        self.baseline_labels.borrow().clone()
    }

    pub fn candidate_limits(&self) -> Vec<usize> {
        self.candidate_limits.borrow().clone()
    }

    pub fn range_queries(&self) -> Vec<(Option<String>, String)> {
        self.range_queries.borrow().clone()
    }
}

impl OriginReader for FakeOrigin {
    fn supports_history(&self) -> bool {
        self.supports_history
    }

    fn find_baseline(
        &self,
        _start: &Revision,
        label: &str,
    ) -> Result<Option<Baseline>, MigrationError> {
        self.baseline_labels.borrow_mut().push(label.to_string());
        Ok(self.baseline.clone())
    }

    fn find_baselines_without_label(
        &self,
        _start: &Revision,
        limit: usize,
    ) -> Result<Vec<Revision>, MigrationError> {
        self.candidate_limits.borrow_mut().push(limit);
        Ok(self.candidates.iter().take(limit).cloned().collect())
    }

    fn change(&self, revision: &Revision) -> Result<Change, MigrationError> {
        self.known
            .get(revision.as_str())
            .cloned()
            .ok_or_else(|| MigrationError::CannotResolveRevision(revision.to_string()))
    }

    fn changes(
        &self,
        from: Option<&Revision>,
        to: &Revision,
    ) -> Result<ChangesResponse, MigrationError> {
        self.range_queries
            .borrow_mut()
            .push((from.map(|r| r.as_str().to_string()), to.as_str().to_string()));
        Ok(self.range.clone())
    }
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

struct DestinationCommit {
    id: String,
    label_value: String,
    visible_from_visit: usize,
}

pub struct FakeDestination {
    pub supports_history: bool,
    label: String,
    /// Newest first.
    commits: Vec<DestinationCommit>,
    visits: Cell<usize>,
    visited: RefCell<Vec<String>>,
}

impl Default for FakeDestination {
    fn default() -> Self {
        Self {
            supports_history: true,
            label: "Origin-RevId".to_string(),
            commits: Vec::new(),
            visits: Cell::new(0),
            visited: RefCell::default(),
        }
    }
}

impl FakeDestination {
    pub fn visits(&self) -> usize {
        self.visits.get()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.borrow().clone()
    }
}

impl DestinationWriter for FakeDestination {
    fn supports_history(&self) -> bool {
        self.supports_history
    }

    fn label_name_when_origin(&self) -> String {
        self.label.clone()
    }

    fn visit_changes_with_any_label(
        &self,
        _start: Option<&Revision>,
        label_names: &[String],
        visitor: &mut dyn FnMut(&Change, &Labels) -> ControlFlow<String>,
    ) -> Result<Option<String>, MigrationError> {
        let visit = self.visits.get() + 1;
        self.visits.set(visit);

        for commit in self.commits.iter().filter(|c| c.visible_from_visit <= visit) {
            let mut change = change(&commit.id);
            change.labels.insert(self.label.clone(), commit.label_value.clone());
            let matched = change.labels.matching_any(label_names);
            if matched.is_empty() {
                continue;
            }
            self.visited.borrow_mut().push(commit.id.clone());
            if let ControlFlow::Break(found) = visitor(&change, &matched) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Run helper
// ---------------------------------------------------------------------------

pub enum LastRev {
    Missing,
    Found(Revision),
    Broken,
}

#[derive(Debug, Clone, Copy)]
pub enum MigrateOutcome {
    /// `migrate` fails with an empty-change error.
    Empty,
    /// A created effect that carries errors.
    Errors,
    /// A noop effect that carries errors.
    NoopWithErrors,
    Fail(ErrorKind),
}

#[derive(Debug, Clone)]
pub struct RecordedMigration {
    pub revision: Revision,
    pub last_rev: Option<Revision>,
    pub metadata: Metadata,
    pub changes: ChangeBatch,
    pub baseline: Option<Baseline>,
    pub identity_revision: Revision,
}

pub struct FakeHelper {
    pub resolved: Revision,
    pub last_rev: LastRev,
    pub squash_without_history: bool,
    pub options: WorkflowOptions,
    pub origin: FakeOrigin,
    pub destination: FakeDestination,
    pub console: FakeConsole,
    response: ChangesResponse,
    skipped: HashSet<String>,
    outcomes: HashMap<String, MigrateOutcome>,
    migrations: RefCell<Vec<RecordedMigration>>,
    attempted: RefCell<Vec<String>>,
    committed: RefCell<Vec<String>>,
    for_changes_calls: RefCell<Vec<Vec<String>>>,
    change_queries: RefCell<Vec<Option<Revision>>>,
    validations: RefCell<Vec<Option<String>>>,
}

impl FakeHelper {
    pub fn new(resolved: &str) -> Self {
        Self {
            resolved: Revision::new(resolved),
            last_rev: LastRev::Missing,
            squash_without_history: false,
            options: WorkflowOptions::default(),
            origin: FakeOrigin::default(),
            destination: FakeDestination::default(),
            console: FakeConsole::default(),
            response: ChangesResponse::no_changes(EmptyReason::NoChanges),
            skipped: HashSet::new(),
            outcomes: HashMap::new(),
            migrations: RefCell::default(),
            attempted: RefCell::default(),
            committed: RefCell::default(),
            for_changes_calls: RefCell::default(),
            change_queries: RefCell::default(),
            validations: RefCell::default(),
        }
    }

    pub fn with_last_rev(mut self, id: &str) -> Self {
        self.last_rev = LastRev::Found(Revision::new(id));
        self
    }

    pub fn with_changes(mut self, ids: &[&str]) -> Self {
        self.response = ChangesResponse::for_changes(ids.iter().map(|id| change(id)).collect());
        self
    }

    pub fn with_empty(mut self, reason: EmptyReason) -> Self {
        self.response = ChangesResponse::no_changes(reason);
        self
    }

    pub fn with_skipped(mut self, ids: &[&str]) -> Self {
        self.skipped.extend(ids.iter().map(|id| id.to_string()));
        self
    }

    pub fn with_outcome(mut self, id: &str, outcome: MigrateOutcome) -> Self {
        self.outcomes.insert(id.to_string(), outcome);
        self
    }

    pub fn with_force(mut self) -> Self {
        self.options.force = true;
        self
    }

    pub fn with_iterative_limit(mut self, limit: usize) -> Self {
        self.options.iterative_limit_changes = Some(limit);
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.options.change_request_parent = Some(parent.to_string());
        self
    }

    pub fn with_from_sot_limit(mut self, limit: usize) -> Self {
        self.options.change_request_from_sot_limit = Some(limit);
        self
    }

    pub fn with_retry(mut self, delays: &[u64]) -> Self {
        self.options.change_request_from_sot_retry = delays.to_vec();
        self
    }

    pub fn with_answers(self, answers: &[bool]) -> Self {
        self.console.answers.borrow_mut().extend(answers);
        self
    }

    pub fn with_origin_baseline(mut self, destination: &str, origin: &str) -> Self {
        self.origin.baseline = Some(Baseline::new(destination, Some(Revision::new(origin))));
        self
    }

    pub fn with_origin_range(mut self, ids: &[&str]) -> Self {
        self.origin.range = ChangesResponse::for_changes(ids.iter().map(|id| change(id)).collect());
        self
    }

    pub fn with_origin_empty(mut self, reason: EmptyReason) -> Self {
        self.origin.range = ChangesResponse::no_changes(reason);
        self
    }

    pub fn with_origin_change(mut self, id: &str) -> Self {
        self.origin.known.insert(id.to_string(), change(id));
        self
    }

    pub fn with_candidates(mut self, ids: &[&str]) -> Self {
        self.origin.candidates = ids.iter().map(|id| Revision::new(*id)).collect();
        self
    }

    pub fn with_destination_commit(self, id: &str, origin_value: &str) -> Self {
        self.with_destination_commit_visible_after(id, origin_value, 1)
    }

    /// The commit only shows up from the `visit`-th destination walk on.
    pub fn with_destination_commit_visible_after(
        mut self,
        id: &str,
        origin_value: &str,
        visit: usize,
    ) -> Self {
        self.destination.commits.insert(
            0,
            DestinationCommit {
                id: id.to_string(),
                label_value: origin_value.to_string(),
                visible_from_visit: visit,
            },
        );
        self
    }

    pub fn default_author_value(&self) -> Author {
        Author::new("Default Author", "default@example.com")
    }

    pub fn migrations(&self) -> Vec<RecordedMigration> {
        self.migrations.borrow().clone()
    }

    pub fn attempted(&self) -> Vec<String> {
        self.attempted.borrow().clone()
    }

    pub fn committed(&self) -> Vec<String> {
        self.committed.borrow().clone()
    }

    pub fn for_changes_calls(&self) -> Vec<Vec<String>> {
        self.for_changes_calls.borrow().clone()
    }

    pub fn change_queries(&self) -> usize {
        self.change_queries.borrow().len()
    }

    pub fn last_change_query_from(&self) -> Option<Option<Revision>> {
        self.change_queries.borrow().last().cloned()
    }

    pub fn validations(&self) -> Vec<Option<String>> {
        self.validations.borrow().clone()
    }
}

impl RunHelper for FakeHelper {
    fn resolved_ref(&self) -> &Revision {
        &self.resolved
    }

    fn last_rev(&self) -> Result<Revision, MigrationError> {
        match &self.last_rev {
            LastRev::Found(rev) => Ok(rev.clone()),
            LastRev::Missing => Err(MigrationError::CannotResolveRevision(
                "no origin label in destination".to_string(),
            )),
            LastRev::Broken => Err(MigrationError::repository("destination unreachable")),
        }
    }

    fn changes(
        &self,
        from: Option<&Revision>,
        _to: &Revision,
    ) -> Result<ChangesResponse, MigrationError> {
        self.change_queries.borrow_mut().push(from.cloned());
        Ok(self.response.clone())
    }

    fn validate_repo_in_last_rev_state(
        &self,
        metadata: Option<&Metadata>,
    ) -> Result<(), MigrationError> {
        self.validations
            .borrow_mut()
            .push(metadata.map(|m| m.message.clone()));
        Ok(())
    }

    fn for_changes(
        &self,
        changes: &[Change],
    ) -> Result<Box<dyn ScopedMigrator + '_>, MigrationError> {
        self.for_changes_calls
            .borrow_mut()
            .push(ids(changes).into_iter().map(String::from).collect());
        Ok(Box::new(FakeScoped { helper: self }))
    }

    fn origin_reader(&self) -> &dyn OriginReader {
        &self.origin
    }

    fn destination_writer(&self) -> &dyn DestinationWriter {
        &self.destination
    }

    fn console(&self) -> &dyn Console {
        &self.console
    }

    fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    fn is_squash_without_history(&self) -> bool {
        self.squash_without_history
    }

    fn default_author(&self) -> Author {
        self.default_author_value()
    }

    fn origin_resolve(&self, reference: &str) -> Result<Revision, MigrationError> {
        Ok(Revision::new(reference))
    }

    fn origin_files(&self) -> String {
        "glob([\"**\"])".to_string()
    }
}

struct FakeScoped<'a> {
    helper: &'a FakeHelper,
}

impl ScopedMigrator for FakeScoped<'_> {
    fn skip_change(&self, change: &Change) -> bool {
        self.helper.skipped.contains(change.revision.as_str())
    }

    fn migrate(
        &self,
        request: MigrationRequest<'_>,
    ) -> Result<Vec<DestinationEffect>, MigrationError> {
        let id = request.revision.as_str().to_string();
        request.console.info(&format!("migrating {}", id));
        self.helper.attempted.borrow_mut().push(id.clone());
        self.helper.migrations.borrow_mut().push(RecordedMigration {
            revision: request.revision.clone(),
            last_rev: request.last_rev.clone(),
            metadata: request.metadata.clone(),
            changes: request.changes.clone(),
            baseline: request.baseline.clone(),
            identity_revision: request.identity_revision.clone(),
        });

        let effect = DestinationEffect::new(EffectKind::Created, format!("created {}", id));
        let effects = match self.helper.outcomes.get(&id).copied() {
            None => vec![effect],
            Some(MigrateOutcome::Errors) => {
                vec![effect.with_errors(vec!["check failed".to_string()])]
            }
            Some(MigrateOutcome::NoopWithErrors) => vec![DestinationEffect::new(
                EffectKind::Noop,
                "nothing to do",
            )
            .with_errors(vec!["ignored".to_string()])],
            Some(MigrateOutcome::Empty) => {
                return Err(MigrationError::empty_change(format!("{} is empty", id)));
            }
            Some(MigrateOutcome::Fail(kind)) => return Err(failure(kind, &id)),
        };
        self.helper.committed.borrow_mut().push(id);
        Ok(effects)
    }
}

fn failure(kind: ErrorKind, id: &str) -> MigrationError {
    match kind {
        ErrorKind::Validation => MigrationError::validation(format!("{} is invalid", id)),
        ErrorKind::Repository => MigrationError::repository(format!("writing {} failed", id)),
        ErrorKind::EmptyChange => MigrationError::empty_change(format!("{} is empty", id)),
        ErrorKind::Rejected => MigrationError::ChangeRejected(format!("{} rejected", id)),
    }
}
