//! Destination baseline lookup for CHANGE_REQUEST_FROM_SOT.
//!
//! Walks destination changes labelled with the origin label, newest first,
//! looking for one whose label value names a given origin revision. The
//! destination may lag behind the origin, so the lookup is retried after
//! each delay in `change_request_from_sot_retry`.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::errors::MigrationError;
use crate::helper::RunHelper;
use crate::models::{Change, Labels};
use crate::revision::canonical_revision_id;

/// A wait was cut short.
#[derive(Debug, Error)]
#[error("sleep interrupted")]
pub struct Interrupted;

/// Blocks the caller between lookup attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted>;
}

/// Sleeps on the current thread. When an interrupt flag is attached the wait
/// is sliced so that setting the flag ends it early with [`Interrupted`].
#[derive(Debug, Clone, Default)]
pub struct ThreadSleeper {
    interrupt: Option<Arc<AtomicBool>>,
}

const SLEEP_SLICE: Duration = Duration::from_millis(100);

impl ThreadSleeper {
    pub fn with_interrupt(interrupt: Arc<AtomicBool>) -> Self {
        Self {
            interrupt: Some(interrupt),
        }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let Some(flag) = &self.interrupt else {
            std::thread::sleep(duration);
            return Ok(());
        };
        // No representable deadline: wait until interrupted.
        let deadline = Instant::now().checked_add(duration);
        loop {
            if flag.load(Ordering::SeqCst) {
                return Err(Interrupted);
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    (deadline - now).min(SLEEP_SLICE)
                }
                None => SLEEP_SLICE,
            };
            std::thread::sleep(slice);
        }
    }
}

/// Finds the destination change that corresponds to an origin revision.
pub struct DestinationBaselineLookup<'a> {
    helper: &'a dyn RunHelper,
    sleeper: &'a dyn Sleeper,
    label_names: Vec<String>,
}

impl<'a> DestinationBaselineLookup<'a> {
    pub fn new(helper: &'a dyn RunHelper, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            helper,
            sleeper,
            label_names: vec![helper.origin_label_name()],
        }
    }

    /// One pass over the destination. `origin_revision` must already be
    /// canonical.
    pub fn lookup_once(&self, origin_revision: &str) -> Result<Option<String>, MigrationError> {
        self.helper.destination_writer().visit_changes_with_any_label(
            None,
            &self.label_names,
            &mut |change: &Change, matched: &Labels| {
                if matched
                    .values()
                    .any(|value| canonical_revision_id(value) == origin_revision)
                {
                    ControlFlow::Break(change.revision.as_str().to_string())
                } else {
                    ControlFlow::Continue(())
                }
            },
        )
    }

    /// [`lookup_once`](Self::lookup_once), retried after each configured
    /// delay. `Ok(None)` once the delays are exhausted.
    pub fn lookup_with_retry(
        &self,
        origin_revision: &str,
    ) -> Result<Option<String>, MigrationError> {
        if let Some(found) = self.lookup_once(origin_revision)? {
            return Ok(Some(found));
        }

        for &delay in &self.helper.options().change_request_from_sot_retry {
            self.helper.console().warn(&format!(
                "Couldn't find a change in the destination with {} label and {} value. \
                 Retrying in {} seconds...",
                self.label_names.join(", "),
                origin_revision,
                delay
            ));
            self.sleeper
                .sleep(Duration::from_secs(delay))
                .map_err(|e| {
                    MigrationError::repository_with_source(
                        "Interrupted while waiting for CHANGE_REQUEST_FROM_SOT destination \
                         baseline to be available",
                        e,
                    )
                })?;
            if let Some(found) = self.lookup_once(origin_revision)? {
                return Ok(Some(found));
            }
        }

        debug!(origin_revision, "no destination baseline after retries");
        Ok(None)
    }
}
