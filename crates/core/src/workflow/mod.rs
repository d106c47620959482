//! Workflow modes: how origin changes become destination migration units.
//!
//! | Mode | Migration units | Baseline |
//! |------|-----------------|----------|
//! | `SQUASH` | one, with every pending change | none |
//! | `ITERATIVE` | one per pending change | none |
//! | `CHANGE_REQUEST` | one | found through an origin label, or explicit |
//! | `CHANGE_REQUEST_FROM_SOT` | one | destination change labelled with an origin ancestor |
//!
//! Every mode drives [`ScopedMigrator::migrate`](crate::helper::ScopedMigrator::migrate)
//! through a [`RunHelper`].

pub mod baseline_lookup;
pub mod change_request;
pub mod empty_change;
pub mod iterative;
pub mod last_rev;
pub mod squash;

#[cfg(test)]
pub(crate) mod test_support;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::MigrationError;
use crate::helper::RunHelper;

pub use baseline_lookup::{DestinationBaselineLookup, Interrupted, Sleeper, ThreadSleeper};

/// The migration algorithm for a workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowMode {
    /// Create a single commit in the destination with the new tree state.
    #[default]
    Squash,
    /// Import each origin change individually.
    Iterative,
    /// Import an origin tree state diffed against a common parent in the
    /// destination (a pull request, a review change, ...).
    ChangeRequest,
    /// Import from the source of truth: the pending change is already in
    /// the origin, but is reviewed in the destination.
    ChangeRequestFromSot,
}

/// What a run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Calls to `migrate` that completed.
    pub migration_units: usize,
    /// Origin changes the run considered.
    pub changes_discovered: usize,
}

impl WorkflowMode {
    pub const ALL: [WorkflowMode; 4] = [
        WorkflowMode::Squash,
        WorkflowMode::Iterative,
        WorkflowMode::ChangeRequest,
        WorkflowMode::ChangeRequestFromSot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Squash => "SQUASH",
            Self::Iterative => "ITERATIVE",
            Self::ChangeRequest => "CHANGE_REQUEST",
            Self::ChangeRequestFromSot => "CHANGE_REQUEST_FROM_SOT",
        }
    }

    /// One-line description for help output.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Squash => "Create a single commit in the destination with new tree state.",
            Self::Iterative => "Import each origin change individually.",
            Self::ChangeRequest => {
                "Import an origin tree state diffed by a common parent in the destination. \
                 This could be a pull request, a review change, etc."
            }
            Self::ChangeRequestFromSot => {
                "Import from the source of truth. Useful when the pending change is already \
                 in the source of truth but is reviewed on a different system."
            }
        }
    }

    /// Run the mode, sleeping on the current thread between baseline lookups.
    pub fn run(self, helper: &dyn RunHelper) -> Result<RunSummary, MigrationError> {
        self.run_with_sleeper(helper, &ThreadSleeper::default())
    }

    /// Run the mode with an explicit [`Sleeper`] for baseline retries.
    pub fn run_with_sleeper(
        self,
        helper: &dyn RunHelper,
        sleeper: &dyn Sleeper,
    ) -> Result<RunSummary, MigrationError> {
        info!(mode = %self, resolved_ref = %helper.resolved_ref(), "running workflow");
        match self {
            Self::Squash => squash::run(helper),
            Self::Iterative => iterative::run(helper),
            Self::ChangeRequest => change_request::run(helper),
            Self::ChangeRequestFromSot => change_request::run_from_sot(helper, sleeper),
        }
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowMode {
    type Err = String;

    /// Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown workflow mode '{}' (expected one of: {})",
                    s,
                    Self::ALL.map(|m| m.as_str()).join(", ")
                )
            })
    }
}
