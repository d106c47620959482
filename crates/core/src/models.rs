//! Shared data model for workflow modes.
//!
//! All values here are owned by a single workflow run and are never shared
//! between runs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::revision::Revision;

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

/// A change author in `Name <email>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

impl FromStr for Author {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let open = s
            .find('<')
            .ok_or_else(|| format!("author '{}' is not in 'Name <email>' form", s))?;
        let email = s[open + 1..]
            .strip_suffix('>')
            .ok_or_else(|| format!("author '{}' is missing a closing '>'", s))?;
        Ok(Self::new(s[..open].trim(), email.trim()))
    }
}

impl TryFrom<String> for Author {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Author> for String {
    fn from(author: Author) -> Self {
        author.to_string()
    }
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Ordered multimap of label name to value. Duplicate names are allowed and
/// insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// All values recorded under `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The entries whose name is one of `names`, in insertion order.
    pub fn matching_any(&self, names: &[String]) -> Labels {
        Labels(
            self.0
                .iter()
                .filter(|(n, _)| names.iter().any(|wanted| wanted == n))
                .cloned()
                .collect(),
        )
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Labels(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Change
// ---------------------------------------------------------------------------

/// A single change read from a repository. Immutable once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub revision: Revision,
    pub message: String,
    pub author: Author,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// Paths touched by the change, when the reader knows them.
    #[serde(default)]
    pub files: Vec<String>,
}

impl Change {
    pub fn new(revision: Revision, message: impl Into<String>, author: Author) -> Self {
        Self {
            revision,
            message: message.into(),
            author,
            labels: Labels::new(),
            date: None,
            files: Vec::new(),
        }
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Change ranges
// ---------------------------------------------------------------------------

/// Why a change-range query came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmptyReason {
    /// No change in the range touched the configured file scope.
    NoChanges,
    /// The requested revision is already at or behind the last migrated one.
    ToIsAncestor,
    /// The two revisions share no history.
    UnrelatedRevisions,
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChanges => write!(f, "NO_CHANGES"),
            Self::ToIsAncestor => write!(f, "TO_IS_ANCESTOR"),
            Self::UnrelatedRevisions => write!(f, "UNRELATED_REVISIONS"),
        }
    }
}

/// Result of a change-range query: either a non-empty list of changes
/// (oldest first) or the reason nothing was found.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangesResponse {
    Changes(Vec<Change>),
    Empty(EmptyReason),
}

impl ChangesResponse {
    /// Wraps `changes`, collapsing an empty list into `Empty(NoChanges)`.
    pub fn for_changes(changes: Vec<Change>) -> Self {
        if changes.is_empty() {
            Self::Empty(EmptyReason::NoChanges)
        } else {
            Self::Changes(changes)
        }
    }

    pub fn no_changes(reason: EmptyReason) -> Self {
        Self::Empty(reason)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty(_))
    }

    pub fn empty_reason(&self) -> Option<EmptyReason> {
        match self {
            Self::Empty(reason) => Some(*reason),
            Self::Changes(_) => None,
        }
    }

    /// The changes, oldest first. Empty when there are none.
    pub fn changes(&self) -> &[Change] {
        match self {
            Self::Changes(changes) => changes,
            Self::Empty(_) => &[],
        }
    }

    pub fn into_changes(self) -> Vec<Change> {
        match self {
            Self::Changes(changes) => changes,
            Self::Empty(_) => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Baseline, metadata, batches
// ---------------------------------------------------------------------------

/// The destination point a change-request diff is computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Destination revision string.
    pub baseline: String,
    /// Matching origin revision. `None` when the operator supplied the
    /// baseline explicitly and no origin counterpart is known.
    pub origin_revision: Option<Revision>,
}

impl Baseline {
    pub fn new(baseline: impl Into<String>, origin_revision: Option<Revision>) -> Self {
        Self {
            baseline: baseline.into(),
            origin_revision,
        }
    }
}

/// Describes one migration unit, independent of the individual changes in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub message: String,
    pub author: Author,
    #[serde(default)]
    pub labels: Labels,
}

impl Metadata {
    pub fn new(message: impl Into<String>, author: Author) -> Self {
        Self {
            message: message.into(),
            author,
            labels: Labels::new(),
        }
    }
}

/// Changes handed to the writer for one migration unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeBatch {
    /// Changes in this unit, newest first. The modes reverse the
    /// oldest-first range they read from the origin before handing it over.
    pub current: Vec<Change>,
    /// Changes already migrated earlier in the same run, most recent first.
    pub migrated: Vec<Change>,
}

impl ChangeBatch {
    pub fn new(current: Vec<Change>, migrated: Vec<Change>) -> Self {
        Self { current, migrated }
    }
}

// ---------------------------------------------------------------------------
// Destination effects
// ---------------------------------------------------------------------------

/// What a migration unit did in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectKind {
    Created,
    Updated,
    Noop,
    NoopAgainstPendingChange,
    InsufficientApprovals,
    Started,
    Error,
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Noop => write!(f, "noop"),
            Self::NoopAgainstPendingChange => write!(f, "noop_against_pending_change"),
            Self::InsufficientApprovals => write!(f, "insufficient_approvals"),
            Self::Started => write!(f, "started"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one write in the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationEffect {
    pub kind: EffectKind,
    pub summary: String,
    #[serde(default)]
    pub errors: Vec<String>,
    /// Destination revision created or updated, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ref: Option<String>,
}

impl DestinationEffect {
    pub fn new(kind: EffectKind, summary: impl Into<String>) -> Self {
        Self {
            kind,
            summary: summary.into(),
            errors: Vec::new(),
            destination_ref: None,
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_destination_ref(mut self, destination_ref: impl Into<String>) -> Self {
        self.destination_ref = Some(destination_ref.into());
        self
    }

    /// `true` for non-NOOP effects that report errors.
    pub fn has_reportable_errors(&self) -> bool {
        self.kind != EffectKind::Noop && !self.errors.is_empty()
    }
}
