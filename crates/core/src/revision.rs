//! Origin and destination revision identifiers.
//!
//! Review systems append metadata to revision strings, e.g.
//! `aaaabbbbccccddddeeeeffff1111222233334444 PatchSet-1`. Only the leading
//! identifier takes part in equality, so a patch-set bump does not make two
//! references to the same commit look different.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Returns the identifier part of a revision string: everything before the
/// first space.
pub fn canonical_revision_id(s: &str) -> &str {
    match s.find(' ') {
        Some(idx) => &s[..idx],
        None => s,
    }
}

/// An opaque revision in either the origin or the destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    /// Full revision string, possibly carrying review metadata.
    id: String,
    /// Human-facing reference the revision was resolved from (branch, change
    /// number), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
}

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// The full revision string.
    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// The identifier used for equality checks.
    pub fn canonical_id(&self) -> &str {
        canonical_revision_id(&self.id)
    }

    /// Reference name when known, otherwise the revision string itself.
    pub fn reference(&self) -> &str {
        self.reference.as_deref().unwrap_or(&self.id)
    }
}

impl PartialEq for Revision {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_id() == other.canonical_id()
    }
}

impl Eq for Revision {}

impl Hash for Revision {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_id().hash(state);
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl From<&str> for Revision {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
