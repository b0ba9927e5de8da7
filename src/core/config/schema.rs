//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! encoding = "utf-8"
//! keep_history = true
//! unit_extensions = ["unit"]
//!
//! [[source_roots]]
//! path = "src"
//! exclusion = ["gen/**", "**/*Test.unit"]
//!
//! [[source_roots]]
//! path = "legacy"
//! enabled = false
//! encoding = "latin1"
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing: root paths must be valid relative
//! resource paths, encodings must be known, and patterns must compile.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::encoding;
use crate::core::membership::compile_pattern;
use crate::core::types::ResourcePath;

/// Workspace configuration as stored in `workcopy.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Project text encoding label (default: platform default, UTF-8)
    pub encoding: Option<String>,

    /// Preserve the previous version when replacing a resource (default: true)
    pub keep_history: Option<bool>,

    /// Extensions that denote a compilation unit (default: `["unit"]`)
    pub unit_extensions: Option<Vec<String>>,

    /// Build roots
    pub source_roots: Vec<SourceRootConfig>,
}

impl WorkspaceConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(label) = &self.encoding {
            if !encoding::is_supported(label) {
                return Err(ConfigError::InvalidValue(format!(
                    "unsupported encoding '{label}'"
                )));
            }
        }

        if let Some(extensions) = &self.unit_extensions {
            if extensions.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "unit_extensions cannot be empty".to_string(),
                ));
            }
            if let Some(bad) = extensions
                .iter()
                .find(|e| e.is_empty() || e.contains('.') || e.contains('/'))
            {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid unit extension '{bad}'"
                )));
            }
        }

        let mut seen = HashSet::new();
        for root in &self.source_roots {
            root.validate()?;
            if !seen.insert(root.path.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate source root '{}'",
                    root.path
                )));
            }
        }

        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

/// One build root and its membership rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceRootConfig {
    /// Root path relative to the store root
    pub path: String,

    /// Whether the root currently participates in the build
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Encoding override for units below this root
    #[serde(default)]
    pub encoding: Option<String>,

    /// Inclusion patterns, relative to the root (empty = everything)
    #[serde(default)]
    pub inclusion: Vec<String>,

    /// Exclusion patterns, relative to the root
    #[serde(default)]
    pub exclusion: Vec<String>,
}

impl SourceRootConfig {
    /// An enabled root with no patterns and no encoding override.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
            encoding: None,
            inclusion: Vec::new(),
            exclusion: Vec::new(),
        }
    }

    /// Validate this root.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a bad path, encoding or pattern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ResourcePath::new(self.path.as_str()).map_err(|e| {
            ConfigError::InvalidValue(format!("invalid source root '{}': {}", self.path, e))
        })?;

        if let Some(label) = &self.encoding {
            if !encoding::is_supported(label) {
                return Err(ConfigError::InvalidValue(format!(
                    "unsupported encoding '{}' for source root '{}'",
                    label, self.path
                )));
            }
        }

        for pattern in self.inclusion.iter().chain(&self.exclusion) {
            compile_pattern(pattern).map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "invalid pattern '{}' for source root '{}': {}",
                    pattern, self.path, e
                ))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml = r#"
            encoding = "utf-8"
            keep_history = false
            unit_extensions = ["unit", "u"]

            [[source_roots]]
            path = "src"
            exclusion = ["gen/**"]

            [[source_roots]]
            path = "legacy"
            enabled = false
            encoding = "latin1"
            inclusion = ["keep/**"]
        "#;
        let config: WorkspaceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.encoding.as_deref(), Some("utf-8"));
        assert_eq!(config.keep_history, Some(false));
        assert_eq!(config.source_roots.len(), 2);
        assert!(config.source_roots[0].enabled);
        assert!(!config.source_roots[1].enabled);
        assert_eq!(config.source_roots[1].inclusion, vec!["keep/**"]);
        config.validate().unwrap();
    }

    #[test]
    fn empty_config_is_valid() {
        let config: WorkspaceConfig = toml::from_str("").unwrap();
        assert_eq!(config, WorkspaceConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(toml::from_str::<WorkspaceConfig>("colour = \"blue\"").is_err());
        assert!(toml::from_str::<WorkspaceConfig>("[[source_roots]]\npath = \"src\"\nlive = true\n").is_err());
    }

    #[test]
    fn unknown_encoding_rejected() {
        let config = WorkspaceConfig {
            encoding: Some("klingon-8".into()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn bad_root_path_rejected() {
        for path in ["", "/abs", "../up", "src/"] {
            let config = WorkspaceConfig {
                source_roots: vec![SourceRootConfig::new(path)],
                ..Default::default()
            };
            assert!(config.validate().is_err(), "path {path:?} should be rejected");
        }
    }

    #[test]
    fn duplicate_root_rejected() {
        let config = WorkspaceConfig {
            source_roots: vec![SourceRootConfig::new("src"), SourceRootConfig::new("src")],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn bad_pattern_rejected() {
        let mut root = SourceRootConfig::new("src");
        root.exclusion.push("[unclosed".into());
        assert!(root.validate().is_err());
    }

    #[test]
    fn bad_extensions_rejected() {
        let empty = WorkspaceConfig {
            unit_extensions: Some(vec![]),
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let dotted = WorkspaceConfig {
            unit_extensions: Some(vec![".unit".into()]),
            ..Default::default()
        };
        assert!(dotted.validate().is_err());
    }
}
