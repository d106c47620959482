//! revmigrate core library.
//!
//! This crate provides the workflow modes that decide how origin changes
//! become destination migration units (SQUASH, ITERATIVE, CHANGE_REQUEST and
//! CHANGE_REQUEST_FROM_SOT), the collaborator traits those modes drive,
//! configuration, and an in-memory replay backend.

pub mod config;
pub mod console;
pub mod errors;
pub mod helper;
pub mod models;
pub mod replay;
pub mod revision;
pub mod workflow;

// Re-exports for convenience.
pub use config::{MigrationConfig, WorkflowOptions};
pub use console::{Console, LogConsole};
pub use errors::{CoreError, ErrorKind, MigrationError};
pub use helper::RunHelper;
pub use replay::{ReplayFixture, ReplayRepository};
pub use revision::Revision;
pub use workflow::{RunSummary, WorkflowMode};
