//! TOML description of an origin history and a destination.
//!
//! ```toml
//! requested = "r3"
//! origin_files = ["src/**"]
//!
//! [origin]
//! [[origin.changes]]
//! id = "r1"
//! message = "Add parser"
//! author = "Jane <jane@example.com>"
//! files = ["src/parser.rs"]
//!
//! [destination]
//! origin_label = "GitOrigin-RevId"
//! [[destination.commits]]
//! id = "d1"
//! message = "Import r1"
//! labels = { GitOrigin-RevId = "r1", Reviewed-By = ["ana", "max"] }
//! ```
//!
//! Labels keep document order. A name mapped to an array repeats the label
//! once per value.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ReplayError;
use crate::models::{Author, Change, Labels};
use crate::revision::Revision;

/// Label the destination writes when no `origin_label` is configured.
pub const DEFAULT_ORIGIN_LABEL: &str = "GitOrigin-RevId";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFixture {
    /// Origin change to migrate. Defaults to the newest origin change.
    #[serde(default)]
    pub requested: Option<String>,

    /// Glob patterns selecting the origin files in scope.
    #[serde(default = "default_origin_files")]
    pub origin_files: Vec<String>,

    /// Author of squashed imports.
    #[serde(default = "default_author")]
    pub default_author: Author,

    pub origin: OriginFixture,

    #[serde(default)]
    pub destination: DestinationFixture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginFixture {
    #[serde(default = "default_true")]
    pub supports_history: bool,

    /// Linear history, oldest first.
    #[serde(default)]
    pub changes: Vec<FixtureChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureChange {
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_change_author")]
    pub author: Author,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Touched paths. An empty list means the change touches every path.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, with = "label_table")]
    pub labels: Labels,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationFixture {
    #[serde(default = "default_true")]
    pub supports_history: bool,

    #[serde(default = "default_origin_label")]
    pub origin_label: String,

    /// Origin revisions the destination reports errors for when migrated.
    #[serde(default)]
    pub reject: Vec<String>,

    /// Existing commits, oldest first.
    #[serde(default)]
    pub commits: Vec<FixtureCommit>,
}

impl Default for DestinationFixture {
    fn default() -> Self {
        Self {
            supports_history: true,
            origin_label: default_origin_label(),
            reject: Vec::new(),
            commits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCommit {
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_change_author")]
    pub author: Author,
    #[serde(default, with = "label_table")]
    pub labels: Labels,
}

/// TOML tables for [`Labels`]. Values are a string or an array of strings.
/// Repeated names are grouped under their first occurrence when written.
mod label_table {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::models::Labels;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Values {
        One(String),
        Many(Vec<String>),
    }

    struct LabelTableVisitor;

    impl<'de> Visitor<'de> for LabelTableVisitor {
        type Value = Labels;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a table of label names to a string or an array of strings")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Labels, A::Error> {
            let mut labels = Labels::new();
            while let Some((name, values)) = map.next_entry::<String, Values>()? {
                match values {
                    Values::One(value) => labels.insert(name, value),
                    Values::Many(values) => {
                        for value in values {
                            labels.insert(name.clone(), value);
                        }
                    }
                }
            }
            Ok(labels)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Labels, D::Error> {
        deserializer.deserialize_map(LabelTableVisitor)
    }

    pub fn serialize<S: Serializer>(labels: &Labels, serializer: S) -> Result<S::Ok, S::Error> {
        let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
        for (name, value) in labels.iter() {
            match grouped.iter_mut().find(|(n, _)| *n == name) {
                Some((_, values)) => values.push(value),
                None => grouped.push((name, vec![value])),
            }
        }

        let mut map = serializer.serialize_map(Some(grouped.len()))?;
        for (name, values) in &grouped {
            match values.as_slice() {
                [value] => map.serialize_entry(name, value)?,
                values => map.serialize_entry(name, values)?,
            }
        }
        map.end()
    }
}

fn default_origin_files() -> Vec<String> {
    vec!["**".to_string()]
}

fn default_author() -> Author {
    Author::new("Revmigrate", "noreply@revmigrate.invalid")
}

fn default_change_author() -> Author {
    Author::new("Unknown", "unknown@example.com")
}

fn default_origin_label() -> String {
    DEFAULT_ORIGIN_LABEL.to_string()
}

fn default_true() -> bool {
    true
}

impl FixtureChange {
    pub fn to_change(&self) -> Change {
        let mut change = Change::new(
            Revision::new(self.id.clone()),
            self.message.clone(),
            self.author.clone(),
        );
        change.date = self.date;
        change.files = self.files.clone();
        change.labels = self.labels.clone();
        change
    }
}

impl ReplayFixture {
    /// Load a fixture from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading replay fixture");

        if !path.exists() {
            return Err(ReplayError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let fixture = Self::from_toml_str(&contents)?;
        debug!(
            origin_changes = fixture.origin.changes.len(),
            destination_commits = fixture.destination.commits.len(),
            "replay fixture parsed"
        );
        Ok(fixture)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ReplayError> {
        let fixture: ReplayFixture =
            toml::from_str(contents).map_err(|e| ReplayError::ParseError(e.to_string()))?;
        fixture.validate()?;
        Ok(fixture)
    }

    /// Structural checks on ids, the requested ref and the file scope.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.origin.changes.is_empty() {
            return Err(ReplayError::Invalid(
                "origin must contain at least one change".into(),
            ));
        }

        let mut seen = HashSet::new();
        for change in &self.origin.changes {
            if change.id.trim().is_empty() {
                return Err(ReplayError::Invalid("origin change with empty id".into()));
            }
            if !seen.insert(change.id.as_str()) {
                return Err(ReplayError::Invalid(format!(
                    "duplicate origin change id '{}'",
                    change.id
                )));
            }
        }

        if let Some(requested) = &self.requested {
            if !self.origin.changes.iter().any(|c| c.id == *requested) {
                return Err(ReplayError::UnknownRevision(requested.clone()));
            }
        }

        let mut seen = HashSet::new();
        for commit in &self.destination.commits {
            if !seen.insert(commit.id.as_str()) {
                return Err(ReplayError::Invalid(format!(
                    "duplicate destination commit id '{}'",
                    commit.id
                )));
            }
        }

        if self.origin_files.is_empty() {
            return Err(ReplayError::Invalid(
                "origin_files must contain at least one pattern".into(),
            ));
        }
        if self.destination.origin_label.trim().is_empty() {
            return Err(ReplayError::Invalid("origin_label must not be empty".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[[origin.changes]]
id = "r1"
message = "First"
author = "Jane <jane@example.com>"
files = ["src/a.rs"]
labels = { Reviewed-By = "max" }
"#;

    #[test]
    fn test_minimal_fixture_defaults() {
        let fixture = ReplayFixture::from_toml_str(MINIMAL).unwrap();
        assert_eq!(fixture.requested, None);
        assert_eq!(fixture.origin_files, vec!["**"]);
        assert!(fixture.origin.supports_history);
        assert!(fixture.destination.supports_history);
        assert_eq!(fixture.destination.origin_label, DEFAULT_ORIGIN_LABEL);
        assert!(fixture.destination.commits.is_empty());

        let change = fixture.origin.changes[0].to_change();
        assert_eq!(change.revision.as_str(), "r1");
        assert_eq!(change.author, Author::new("Jane", "jane@example.com"));
        assert_eq!(change.labels.get_all("Reviewed-By").collect::<Vec<_>>(), ["max"]);
        assert_eq!(change.files, vec!["src/a.rs"]);
    }

    #[test]
    fn test_labels_keep_document_order_and_repeats() {
        let toml = r#"
[[origin.changes]]
id = "r1"
labels = { Zeta = "z", Reviewed-By = ["max", "ana"], Alpha = "a" }

[[destination.commits]]
id = "d1"
labels = { GitOrigin-RevId = ["r1 PatchSet-1", "r1"] }
"#;
        let fixture = ReplayFixture::from_toml_str(toml).unwrap();

        let change = fixture.origin.changes[0].to_change();
        let entries: Vec<_> = change.labels.iter().collect();
        assert_eq!(
            entries,
            [
                ("Zeta", "z"),
                ("Reviewed-By", "max"),
                ("Reviewed-By", "ana"),
                ("Alpha", "a"),
            ]
        );

        let commit = &fixture.destination.commits[0];
        assert_eq!(
            commit.labels.get_all("GitOrigin-RevId").collect::<Vec<_>>(),
            ["r1 PatchSet-1", "r1"]
        );
    }

    #[test]
    fn test_labels_written_back_as_table() {
        let fixture = ReplayFixture::from_toml_str(
            "[[origin.changes]]\nid = \"r1\"\nlabels = { A = [\"1\", \"2\"], B = \"3\" }\n",
        )
        .unwrap();
        let written = toml::to_string(&fixture).unwrap();
        let reread = ReplayFixture::from_toml_str(&written).unwrap();
        assert_eq!(
            reread.origin.changes[0].labels,
            fixture.origin.changes[0].labels
        );
    }

    #[test]
    fn test_rejects_duplicate_origin_ids() {
        let toml = format!("{}\n[[origin.changes]]\nid = \"r1\"\n", MINIMAL);
        let err = ReplayFixture::from_toml_str(&toml).unwrap_err();
        assert!(matches!(err, ReplayError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_requested_ref() {
        let toml = format!("requested = \"r9\"\n{}", MINIMAL);
        let err = ReplayFixture::from_toml_str(&toml).unwrap_err();
        assert!(matches!(err, ReplayError::UnknownRevision(id) if id == "r9"));
    }

    #[test]
    fn test_rejects_empty_origin() {
        let err = ReplayFixture::from_toml_str("[origin]\n").unwrap_err();
        assert!(matches!(err, ReplayError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_author() {
        let toml = "[[origin.changes]]\nid = \"r1\"\nauthor = \"no email\"\n";
        let err = ReplayFixture::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ReplayError::ParseError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(MINIMAL.as_bytes()).unwrap();
        let fixture = ReplayFixture::load_from_file(tmp.path()).unwrap();
        assert_eq!(fixture.origin.changes.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ReplayFixture::load_from_file("/nonexistent/replay.toml").unwrap_err();
        assert!(matches!(err, ReplayError::FileNotFound(_)));
    }
}
