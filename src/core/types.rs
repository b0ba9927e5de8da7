//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ResourcePath`] - Validated store-relative resource path
//! - [`ElementKind`] - Discriminator for element tree nodes
//! - [`ElementPath`] - Identity of an element (names from the root + kind)
//! - [`ModificationMarker`] - Opaque store-side modification fingerprint
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use workcopy::core::types::{ModificationMarker, ResourcePath};
//!
//! let path = ResourcePath::new("src/app/Main.unit").unwrap();
//! assert_eq!(path.file_name(), "Main.unit");
//!
//! assert!(ResourcePath::new("../escape.unit").is_err());
//! assert_ne!(
//!     ModificationMarker::from_generation(1),
//!     ModificationMarker::from_generation(2)
//! );
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid resource path: {0}")]
    InvalidResourcePath(String),

    #[error("invalid element name: {0}")]
    InvalidElementName(String),
}

/// A validated, store-relative resource path.
///
/// Paths always use `/` as separator and must stay inside the store:
/// - Cannot be empty
/// - Cannot start or end with `/`
/// - Cannot contain empty, `.` or `..` components
/// - Cannot contain `\` or ASCII control characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePath(String);

impl ResourcePath {
    /// Create a new validated resource path.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidResourcePath` if the path escapes the store
    /// or contains forbidden characters.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        Self::validate(&path)?;
        Ok(Self(path))
    }

    fn validate(path: &str) -> Result<(), TypeError> {
        if path.is_empty() {
            return Err(TypeError::InvalidResourcePath(
                "resource path cannot be empty".into(),
            ));
        }
        if path.starts_with('/') {
            return Err(TypeError::InvalidResourcePath(format!(
                "resource path cannot be absolute: {path}"
            )));
        }
        if path.ends_with('/') {
            return Err(TypeError::InvalidResourcePath(format!(
                "resource path cannot end with '/': {path}"
            )));
        }
        if path.contains('\\') {
            return Err(TypeError::InvalidResourcePath(format!(
                "resource path cannot contain '\\': {path}"
            )));
        }
        if path.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidResourcePath(
                "resource path cannot contain control characters".into(),
            ));
        }
        for component in path.split('/') {
            match component {
                "" => {
                    return Err(TypeError::InvalidResourcePath(format!(
                        "resource path cannot contain '//': {path}"
                    )))
                }
                "." | ".." => {
                    return Err(TypeError::InvalidResourcePath(format!(
                        "resource path cannot contain '{component}' components: {path}"
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Path components from the store root.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// The last component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The path relative to `prefix`, if this path lies strictly beneath it.
    ///
    /// ```
    /// use workcopy::core::types::ResourcePath;
    ///
    /// let path = ResourcePath::new("src/app/Main.unit").unwrap();
    /// assert_eq!(path.strip_root("src"), Some("app/Main.unit"));
    /// assert_eq!(path.strip_root("sr"), None);
    /// ```
    pub fn strip_root(&self, prefix: &str) -> Option<&str> {
        self.0
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourcePath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.0
    }
}

impl AsRef<str> for ResourcePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether `name` is a syntactically valid unit name for one of `extensions`.
///
/// The stem must be an identifier: an ASCII letter or `_` followed by ASCII
/// alphanumerics or `_`.
///
/// ```
/// use workcopy::core::types::is_valid_unit_name;
///
/// let exts = vec!["unit".to_string()];
/// assert!(is_valid_unit_name("Main.unit", &exts));
/// assert!(!is_valid_unit_name("1Main.unit", &exts));
/// assert!(!is_valid_unit_name("Main.txt", &exts));
/// ```
pub fn is_valid_unit_name(name: &str, extensions: &[String]) -> bool {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    if !extensions.iter().any(|e| e == ext) {
        return false;
    }
    let mut chars = stem.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The kind of an element tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Root of the model.
    Model,
    /// A configured build root.
    SourceRoot,
    /// A folder below a source root (or outside any root).
    Folder,
    /// A compilation unit, bound to a persisted resource.
    Unit,
    /// A type declaration inside a unit.
    Type,
    /// A field declaration.
    Field,
    /// A method declaration.
    Method,
    /// An import declaration.
    Import,
}

impl ElementKind {
    /// Whether elements of this kind are produced by parsing a unit's buffer.
    pub fn is_parsed(self) -> bool {
        matches!(
            self,
            ElementKind::Type | ElementKind::Field | ElementKind::Method | ElementKind::Import
        )
    }

    /// Short lowercase label.
    pub fn label(self) -> &'static str {
        match self {
            ElementKind::Model => "model",
            ElementKind::SourceRoot => "source_root",
            ElementKind::Folder => "folder",
            ElementKind::Unit => "unit",
            ElementKind::Type => "type",
            ElementKind::Field => "field",
            ElementKind::Method => "method",
            ElementKind::Import => "import",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of an element: the names from the tree root plus its kind.
///
/// The model root itself has no names.
///
/// ```
/// use workcopy::core::types::{ElementKind, ElementPath};
///
/// let unit = ElementPath::root()
///     .child(ElementKind::SourceRoot, "src")
///     .child(ElementKind::Unit, "Main.unit");
/// assert_eq!(unit.to_string(), "src/Main.unit#unit");
/// assert_eq!(unit.name(), Some("Main.unit"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementPath {
    names: Vec<String>,
    kind: ElementKind,
}

impl ElementPath {
    /// Identity of the model root.
    pub fn root() -> Self {
        Self {
            names: Vec::new(),
            kind: ElementKind::Model,
        }
    }

    /// Identity of a child of this element.
    pub fn child(&self, kind: ElementKind, name: &str) -> Self {
        let mut names = self.names.clone();
        names.push(name.to_string());
        Self { names, kind }
    }

    /// Names from the root, outermost first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The last name, or `None` for the model root.
    pub fn name(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }

    /// The element kind.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.names.join("/"), self.kind)
    }
}

/// An opaque marker of persisted-store modification state.
///
/// Markers are derived from store-side modification metadata, never from
/// content: two writes of identical bytes still produce different markers.
/// They are only meaningful when compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModificationMarker(String);

impl ModificationMarker {
    /// Marker for a store that counts modification events.
    pub fn from_generation(generation: u64) -> Self {
        Self(format!("gen-{generation}"))
    }

    /// Marker derived from file metadata: length, modification time, and
    /// whatever file identity the platform exposes (inode, device, status
    /// change time).
    pub fn from_metadata(len: u64, modified_nanos: u128, identity: &[u64]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(len.to_le_bytes());
        hasher.update(b"\0");
        hasher.update(modified_nanos.to_le_bytes());
        for part in identity {
            hasher.update(b"\0");
            hasher.update(part.to_le_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the marker as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModificationMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp in RFC3339 format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// SHA-256 hex digest of text, used for element content fingerprints.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod resource_path {
        use super::*;

        #[test]
        fn valid_paths() {
            assert!(ResourcePath::new("Main.unit").is_ok());
            assert!(ResourcePath::new("src/app/Main.unit").is_ok());
            assert!(ResourcePath::new("with space/x.unit").is_ok());
            assert!(ResourcePath::new(".hidden/x").is_ok());
        }

        #[test]
        fn empty_rejected() {
            assert!(ResourcePath::new("").is_err());
        }

        #[test]
        fn absolute_rejected() {
            assert!(ResourcePath::new("/etc/passwd").is_err());
        }

        #[test]
        fn trailing_slash_rejected() {
            assert!(ResourcePath::new("src/").is_err());
        }

        #[test]
        fn dot_components_rejected() {
            assert!(ResourcePath::new("src/../x").is_err());
            assert!(ResourcePath::new("./x").is_err());
            assert!(ResourcePath::new("..").is_err());
        }

        #[test]
        fn double_slash_rejected() {
            assert!(ResourcePath::new("src//x").is_err());
        }

        #[test]
        fn backslash_and_control_rejected() {
            assert!(ResourcePath::new("src\\x").is_err());
            assert!(ResourcePath::new("src/x\n").is_err());
        }

        #[test]
        fn file_name_and_components() {
            let path = ResourcePath::new("a/b/c.unit").unwrap();
            assert_eq!(path.file_name(), "c.unit");
            assert_eq!(path.components().collect::<Vec<_>>(), vec!["a", "b", "c.unit"]);
        }

        #[test]
        fn strip_root_requires_separator() {
            let path = ResourcePath::new("src/x.unit").unwrap();
            assert_eq!(path.strip_root("src"), Some("x.unit"));
            assert_eq!(path.strip_root("src/x.unit"), None);
            assert_eq!(path.strip_root("s"), None);
        }

        #[test]
        fn serde_roundtrip() {
            let path = ResourcePath::new("src/x.unit").unwrap();
            let json = serde_json::to_string(&path).unwrap();
            let parsed: ResourcePath = serde_json::from_str(&json).unwrap();
            assert_eq!(path, parsed);
        }

        #[test]
        fn serde_rejects_invalid() {
            let parsed: Result<ResourcePath, _> = serde_json::from_str("\"../x\"");
            assert!(parsed.is_err());
        }
    }

    mod unit_name {
        use super::*;

        fn exts() -> Vec<String> {
            vec!["unit".to_string(), "u".to_string()]
        }

        #[test]
        fn valid_names() {
            assert!(is_valid_unit_name("Main.unit", &exts()));
            assert!(is_valid_unit_name("_private.u", &exts()));
            assert!(is_valid_unit_name("a1_b2.unit", &exts()));
        }

        #[test]
        fn invalid_names() {
            assert!(!is_valid_unit_name("Main", &exts()));
            assert!(!is_valid_unit_name(".unit", &exts()));
            assert!(!is_valid_unit_name("9lives.unit", &exts()));
            assert!(!is_valid_unit_name("has-dash.unit", &exts()));
            assert!(!is_valid_unit_name("Main.txt", &exts()));
        }
    }

    mod element_path {
        use super::*;

        #[test]
        fn root_display() {
            assert_eq!(ElementPath::root().to_string(), "#model");
            assert_eq!(ElementPath::root().name(), None);
        }

        #[test]
        fn same_names_different_kind_differ() {
            let base = ElementPath::root().child(ElementKind::Unit, "A.unit");
            assert_ne!(
                base.child(ElementKind::Type, "A"),
                base.child(ElementKind::Method, "A")
            );
        }
    }

    mod modification_marker {
        use super::*;

        #[test]
        fn generation_markers_differ() {
            assert_eq!(
                ModificationMarker::from_generation(3),
                ModificationMarker::from_generation(3)
            );
            assert_ne!(
                ModificationMarker::from_generation(3),
                ModificationMarker::from_generation(4)
            );
        }

        #[test]
        fn metadata_markers_depend_on_time_and_length() {
            let a = ModificationMarker::from_metadata(10, 1_000, &[7, 1]);
            assert_eq!(a, ModificationMarker::from_metadata(10, 1_000, &[7, 1]));
            assert_ne!(a, ModificationMarker::from_metadata(11, 1_000, &[7, 1]));
            assert_ne!(a, ModificationMarker::from_metadata(10, 1_001, &[7, 1]));
            assert_ne!(a, ModificationMarker::from_metadata(10, 1_000, &[8, 1]));
            assert_ne!(a, ModificationMarker::from_metadata(10, 1_000, &[]));
        }
    }

    #[test]
    fn content_hash_is_hex_sha256() {
        let hash = content_hash("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn timestamp_display_is_rfc3339() {
        assert!(UtcTimestamp::now().to_string().contains('T'));
    }
}
