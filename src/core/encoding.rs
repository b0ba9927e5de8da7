//! core::encoding
//!
//! Text encoding for persisted unit content.
//!
//! Units are edited as Rust strings and persisted as bytes in the configured
//! encoding. A missing encoding means UTF-8, the platform default.
//!
//! # Example
//!
//! ```
//! use workcopy::core::encoding::{decode, encode};
//!
//! let bytes = encode("caf\u{e9}", Some("latin1")).unwrap();
//! assert_eq!(bytes, b"caf\xe9");
//! assert_eq!(decode(&bytes, Some("latin1")).unwrap(), "caf\u{e9}");
//!
//! assert!(encode("\u{65e5}", Some("latin1")).is_err());
//! ```

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};
use thiserror::Error;

use crate::core::config::Config;
use crate::core::types::ResourcePath;

/// Errors from encoding and decoding unit text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("unsupported encoding: {0}")]
    Unsupported(String),

    #[error("text contains characters not representable in {0}")]
    Unmappable(String),

    #[error("bytes are not valid {0}")]
    Malformed(String),
}

/// Resolves the text encoding of a resource.
pub trait EncodingResolver: Send + Sync {
    /// The encoding label for `resource`, or `None` for the platform default.
    fn encoding_for(&self, resource: &ResourcePath) -> Option<String>;
}

/// Encoding resolution from workspace configuration.
///
/// A resource belongs to the source root with the longest matching path.
/// That root's own encoding wins over the project encoding.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredEncoding {
    project: Option<String>,
    roots: Vec<(String, Option<String>)>,
}

impl ConfiguredEncoding {
    pub fn from_config(config: &Config) -> Self {
        Self {
            project: config.encoding().map(str::to_string),
            roots: config
                .source_roots()
                .iter()
                .map(|root| (root.path.clone(), root.encoding.clone()))
                .collect(),
        }
    }
}

impl EncodingResolver for ConfiguredEncoding {
    fn encoding_for(&self, resource: &ResourcePath) -> Option<String> {
        self.roots
            .iter()
            .filter(|(root, _)| resource.strip_root(root).is_some())
            .max_by_key(|(root, _)| root.len())
            .and_then(|(_, encoding)| encoding.clone())
            .or_else(|| self.project.clone())
    }
}

fn lookup(label: Option<&str>) -> Result<&'static Encoding, EncodingError> {
    match label {
        None => Ok(encoding_rs::UTF_8),
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| EncodingError::Unsupported(label.to_string())),
    }
}

/// Whether `label` names an encoding this crate can encode to.
pub fn is_supported(label: &str) -> bool {
    lookup(Some(label)).is_ok()
}

/// Encode `text` as bytes in the encoding named by `label`.
///
/// # Errors
///
/// - [`EncodingError::Unsupported`] if the label is unknown
/// - [`EncodingError::Unmappable`] if a character has no representation
pub fn encode(text: &str, label: Option<&str>) -> Result<Vec<u8>, EncodingError> {
    let encoding = lookup(label)?;

    // encoding_rs only decodes UTF-16; its encoder falls back to UTF-8.
    if encoding == UTF_16LE {
        return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == UTF_16BE {
        return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }

    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(EncodingError::Unmappable(encoding.name().to_string()));
    }
    Ok(bytes.into_owned())
}

/// Decode `bytes` in the encoding named by `label`, removing a leading BOM.
///
/// # Errors
///
/// - [`EncodingError::Unsupported`] if the label is unknown
/// - [`EncodingError::Malformed`] if the bytes are not valid in that encoding
pub fn decode(bytes: &[u8], label: Option<&str>) -> Result<String, EncodingError> {
    let encoding = lookup(label)?;
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        return Err(EncodingError::Malformed(encoding.name().to_string()));
    }
    Ok(text.into_owned())
}
