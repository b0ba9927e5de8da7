//! core::membership
//!
//! Build membership: whether a unit participates in the build.
//!
//! A unit is *managed* when it lies below a configured source root that is
//! enabled, its resource currently exists, and its name is a valid unit
//! name. Managed units are committed through buffers; everything else is
//! written straight to the store.
//!
//! Exclusion is a separate question. An excluded unit below a live root is
//! still managed, but no delta is reported for it.
//!
//! # Patterns
//!
//! Inclusion and exclusion patterns are globs relative to the root:
//! `*` stays within one path segment, `**` spans segments, and a trailing
//! `/` means "everything below this folder".

use glob::{MatchOptions, Pattern, PatternError};

use crate::core::config::{Config, ConfigError};
use crate::core::types::{is_valid_unit_name, ResourcePath};

/// What the membership predicate gets to see about a unit.
#[derive(Debug, Clone, Copy)]
pub struct UnitTarget<'a> {
    /// Path of the source root the unit sits under, if any.
    pub root: Option<&'a str>,
    /// The unit's resource.
    pub resource: &'a ResourcePath,
    /// Whether the resource currently exists in the store.
    pub exists: bool,
}

/// Decides which commit path a unit takes.
pub trait BuildMembership: Send + Sync {
    /// Inside a live build root, accessible, and validly named.
    fn is_managed(&self, target: &UnitTarget<'_>) -> bool;

    /// Filtered out of its root by inclusion/exclusion patterns.
    fn is_excluded(&self, target: &UnitTarget<'_>) -> bool;
}

/// Compile a root-relative pattern.
///
/// A trailing `/` is shorthand for `/**`.
pub fn compile_pattern(pattern: &str) -> Result<Pattern, PatternError> {
    if pattern.ends_with('/') {
        Pattern::new(&format!("{pattern}**"))
    } else {
        Pattern::new(pattern)
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct RootRule {
    path: String,
    enabled: bool,
    inclusion: Vec<Pattern>,
    exclusion: Vec<Pattern>,
}

impl RootRule {
    fn excludes(&self, relative: &str) -> bool {
        let included = self.inclusion.is_empty()
            || self
                .inclusion
                .iter()
                .any(|p| p.matches_with(relative, MATCH_OPTIONS));
        !included
            || self
                .exclusion
                .iter()
                .any(|p| p.matches_with(relative, MATCH_OPTIONS))
    }
}

/// Membership derived from configured source roots.
#[derive(Debug, Clone, Default)]
pub struct ClasspathMembership {
    roots: Vec<RootRule>,
    extensions: Vec<String>,
}

impl ClasspathMembership {
    /// Build the predicate from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a pattern does not compile.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let compile = |root: &str, patterns: &[String]| -> Result<Vec<Pattern>, ConfigError> {
            patterns
                .iter()
                .map(|p| {
                    compile_pattern(p).map_err(|e| {
                        ConfigError::InvalidValue(format!(
                            "invalid pattern '{p}' for source root '{root}': {e}"
                        ))
                    })
                })
                .collect()
        };

        let roots = config
            .source_roots()
            .iter()
            .map(|root| {
                Ok(RootRule {
                    path: root.path.clone(),
                    enabled: root.enabled,
                    inclusion: compile(&root.path, &root.inclusion)?,
                    exclusion: compile(&root.path, &root.exclusion)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            roots,
            extensions: config.unit_extensions(),
        })
    }

    fn rule(&self, root: &str) -> Option<&RootRule> {
        self.roots.iter().find(|r| r.path == root)
    }
}

impl BuildMembership for ClasspathMembership {
    fn is_managed(&self, target: &UnitTarget<'_>) -> bool {
        let Some(rule) = target.root.and_then(|root| self.rule(root)) else {
            return false;
        };
        rule.enabled
            && target.exists
            && is_valid_unit_name(target.resource.file_name(), &self.extensions)
    }

    fn is_excluded(&self, target: &UnitTarget<'_>) -> bool {
        let Some(rule) = target.root.and_then(|root| self.rule(root)) else {
            return false;
        };
        match target.resource.strip_root(&rule.path) {
            Some(relative) => rule.excludes(relative),
            None => false,
        }
    }
}
