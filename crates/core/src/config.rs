//! TOML-based configuration for migration runs.
//!
//! The file selects a workflow mode and carries the operator options the
//! modes consume. Command-line flags layer on top of the loaded values via
//! [`WorkflowOptions`] setters in the CLI.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::workflow::WorkflowMode;

/// Flag that turns otherwise fatal empty or unresolved conditions into
/// warnings.
pub const FORCE_FLAG: &str = "--force";

/// Flag that supplies an explicit destination baseline.
pub const CHANGE_REQUEST_PARENT_FLAG: &str = "--change-request-parent";

/// Flag that bounds the CHANGE_REQUEST_FROM_SOT candidate search.
pub const CHANGE_REQUEST_FROM_SOT_LIMIT_FLAG: &str = "--change-request-from-sot-limit";

/// Longest accepted wait between destination baseline lookups, in seconds.
pub const MAX_RETRY_DELAY_SECS: u64 = 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Workflow selection.
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Operator options consumed by the workflow modes.
    #[serde(default)]
    pub options: WorkflowOptions,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Which workflow to run and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name, used in log output.
    #[serde(default = "default_workflow_name")]
    pub name: String,

    /// Migration algorithm.
    #[serde(default)]
    pub mode: WorkflowMode,

    /// In SQUASH mode, drop the detected change list from the migration unit
    /// even when history is available.
    #[serde(default)]
    pub squash_without_history: bool,
}

fn default_workflow_name() -> String {
    "default".into()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            name: default_workflow_name(),
            mode: WorkflowMode::default(),
            squash_without_history: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Operator-supplied options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOptions {
    /// Proceed past empty, already-migrated, unrelated or unresolvable
    /// states where a mode allows it.
    #[serde(default)]
    pub force: bool,

    /// Explicit baseline for the change-request modes.
    #[serde(default)]
    pub change_request_parent: Option<String>,

    /// Maximum number of changes ITERATIVE migrates per run. Unlimited when
    /// absent.
    #[serde(default)]
    pub iterative_limit_changes: Option<usize>,

    /// Maximum number of candidate baselines CHANGE_REQUEST_FROM_SOT asks
    /// the origin for. Unlimited when absent.
    #[serde(default)]
    pub change_request_from_sot_limit: Option<usize>,

    /// Seconds to wait between destination baseline lookups.
    #[serde(default)]
    pub change_request_from_sot_retry: Vec<u64>,
}

impl WorkflowOptions {
    /// The explicit baseline, ignoring empty strings.
    pub fn change_baseline(&self) -> Option<&str> {
        self.change_request_parent
            .as_deref()
            .filter(|s| !s.is_empty())
    }

    pub fn iterative_limit(&self) -> usize {
        self.iterative_limit_changes.unwrap_or(usize::MAX)
    }

    pub fn from_sot_limit(&self) -> usize {
        self.change_request_from_sot_limit.unwrap_or(usize::MAX)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl MigrationConfig {
    /// Load a [`MigrationConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: MigrationConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workflow.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "workflow.name".into(),
                detail: "workflow name must not be empty".into(),
            });
        }
        if self.options.iterative_limit_changes == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "options.iterative_limit_changes".into(),
                detail: "limit must be > 0".into(),
            });
        }
        if self.options.change_request_from_sot_limit == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "options.change_request_from_sot_limit".into(),
                detail: "limit must be > 0".into(),
            });
        }
        if let Some(delay) = self
            .options
            .change_request_from_sot_retry
            .iter()
            .find(|&&delay| delay > MAX_RETRY_DELAY_SECS)
        {
            return Err(ConfigError::InvalidValue {
                field: "options.change_request_from_sot_retry".into(),
                detail: format!("delay {}s exceeds {}s", delay, MAX_RETRY_DELAY_SECS),
            });
        }
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: format!("expected one of {}", LEVELS.join(", ")),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[workflow]
name = "export"
mode = "CHANGE_REQUEST_FROM_SOT"
squash_without_history = true

[options]
force = true
change_request_parent = "d0c0ffee"
iterative_limit_changes = 10
change_request_from_sot_limit = 3
change_request_from_sot_retry = [1, 5, 30]

[logging]
level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: MigrationConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.workflow.name, "export");
        assert_eq!(config.workflow.mode, WorkflowMode::ChangeRequestFromSot);
        assert!(config.workflow.squash_without_history);
        assert!(config.options.force);
        assert_eq!(config.options.change_baseline(), Some("d0c0ffee"));
        assert_eq!(config.options.iterative_limit(), 10);
        assert_eq!(config.options.from_sot_limit(), 3);
        assert_eq!(config.options.change_request_from_sot_retry, vec![1, 5, 30]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_defaults() {
        let config: MigrationConfig = toml::from_str("").unwrap();
        assert_eq!(config.workflow.name, "default");
        assert_eq!(config.workflow.mode, WorkflowMode::Squash);
        assert!(!config.options.force);
        assert_eq!(config.options.change_baseline(), None);
        assert_eq!(config.options.iterative_limit(), usize::MAX);
        assert_eq!(config.options.from_sot_limit(), usize::MAX);
        assert!(config.options.change_request_from_sot_retry.is_empty());
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_empty_baseline_is_absent() {
        let options = WorkflowOptions {
            change_request_parent: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(options.change_baseline(), None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revmigrate.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = MigrationConfig::load_and_validate(&path).expect("load failed");
        assert_eq!(config.workflow.mode, WorkflowMode::ChangeRequestFromSot);
    }

    #[test]
    fn test_file_not_found() {
        let result = MigrationConfig::load_from_file("/nonexistent/revmigrate.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unknown_mode_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[workflow]\nmode = \"MERGE\"\n").unwrap();
        let result = MigrationConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config: MigrationConfig = toml::from_str(sample_toml()).unwrap();
        config.options.iterative_limit_changes = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "options.iterative_limit_changes"
        ));

        let mut config: MigrationConfig = toml::from_str(sample_toml()).unwrap();
        config.options.change_request_from_sot_limit = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "options.change_request_from_sot_limit"
        ));
    }

    #[test]
    fn test_validate_bounds_retry_delays() {
        let mut config: MigrationConfig = toml::from_str(sample_toml()).unwrap();
        config.options.change_request_from_sot_retry = vec![1, u64::MAX];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "options.change_request_from_sot_retry"
        ));

        config.options.change_request_from_sot_retry = vec![MAX_RETRY_DELAY_SECS];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config: MigrationConfig = toml::from_str(sample_toml()).unwrap();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }
}
