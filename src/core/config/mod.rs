//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first existing file wins:
//! 1. `$WORKCOPY_CONFIG` if set
//! 2. `<workspace>/workcopy.toml` (canonical)
//! 3. `<workspace>/.workcopy/config.toml` (compatibility, warns)
//!
//! When no file exists the defaults apply: UTF-8, history preserved,
//! `.unit` units, and no source roots (every unit is unmanaged).
//!
//! # Example
//!
//! ```no_run
//! use workcopy::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/workspace"))).unwrap();
//! for warning in &result.warnings {
//!     eprintln!("warning: {}", warning.message);
//! }
//! println!("keep history: {}", result.config.keep_history());
//! ```

pub mod schema;

pub use schema::{SourceRootConfig, WorkspaceConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "WORKCOPY_CONFIG";

/// Canonical config file name inside a workspace.
pub const CONFIG_FILE: &str = "workcopy.toml";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Effective configuration with defaults applied by the accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed workspace configuration
    pub workspace: WorkspaceConfig,
    /// Path the configuration was loaded from, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration for a workspace directory.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed,
    /// or validated.
    pub fn load(workspace: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let candidates = env_path
            .into_iter()
            .map(|p| (p, false))
            .chain(workspace.into_iter().flat_map(|ws| {
                [
                    (ws.join(CONFIG_FILE), false),
                    (ws.join(".workcopy").join("config.toml"), true),
                ]
            }));

        for (path, compat) in candidates {
            if !path.is_file() {
                continue;
            }
            if compat {
                warnings.push(ConfigWarning {
                    message: format!(
                        "using compatibility config location; move it to {}",
                        CONFIG_FILE
                    ),
                    path: path.clone(),
                });
            }
            let config = Self::load_file(&path)?;
            return Ok(ConfigLoadResult { config, warnings });
        }

        debug!("no workspace config found, using defaults");
        Ok(ConfigLoadResult {
            config: Config::default(),
            warnings,
        })
    }

    /// Load and validate a specific config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let workspace = Self::parse(&content).map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        debug!(path = %path.display(), "loaded workspace config");
        Ok(Config {
            workspace,
            path: Some(path.to_path_buf()),
        })
    }

    /// Parse and validate TOML configuration text.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` for malformed TOML and `InvalidValue` for values
    /// that fail validation.
    pub fn from_toml(content: &str) -> Result<Config, ConfigError> {
        Ok(Config {
            workspace: Self::parse(content)?,
            path: None,
        })
    }

    fn parse(content: &str) -> Result<WorkspaceConfig, ConfigError> {
        let workspace: WorkspaceConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError {
                path: PathBuf::new(),
                message: e.to_string(),
            })?;
        workspace.validate()?;
        Ok(workspace)
    }

    /// Set the project encoding.
    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.workspace.encoding = Some(label.into());
        self
    }

    /// Set whether replaced resources keep their previous version.
    pub fn with_keep_history(mut self, keep: bool) -> Self {
        self.workspace.keep_history = Some(keep);
        self
    }

    /// Add a source root.
    pub fn with_source_root(mut self, root: SourceRootConfig) -> Self {
        self.workspace.source_roots.push(root);
        self
    }

    /// Path this configuration was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Project encoding, `None` for the platform default.
    pub fn encoding(&self) -> Option<&str> {
        self.workspace.encoding.as_deref()
    }

    /// Whether replaced resources keep their previous version.
    pub fn keep_history(&self) -> bool {
        self.workspace.keep_history.unwrap_or(true)
    }

    /// Extensions that denote a compilation unit.
    pub fn unit_extensions(&self) -> Vec<String> {
        self.workspace
            .unit_extensions
            .clone()
            .unwrap_or_else(|| vec!["unit".to_string()])
    }

    /// Configured build roots.
    pub fn source_roots(&self) -> &[SourceRootConfig] {
        &self.workspace.source_roots
    }
}
