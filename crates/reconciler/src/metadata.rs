//! Image metadata parsing.
//!
//! Resources are YAML mappings in the OCI image resource format:
//!
//! ```yaml
//! registrypath: registry.example/bitcoind:0.21
//! username: deploy
//! password: s3cret
//! ```
//!
//! The document is parsed into a mapping first; each required field is then
//! looked up and validated explicitly. Missing fields are never defaulted.

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};
use crate::types::ImageMetadata;

pub const REGISTRY_PATH_KEY: &str = "registrypath";
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";

/// Parses raw resource bytes into [`ImageMetadata`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataParser;

impl MetadataParser {
    pub const fn new() -> Self {
        Self
    }

    /// Parse and validate a metadata document.
    ///
    /// # Errors
    ///
    /// `MalformedDocument` when the bytes are not UTF-8 YAML with a mapping
    /// at the top level or a field holds a non-scalar; `IncompleteMetadata`
    /// when a required field is missing or blank.
    pub fn parse(&self, raw: &[u8]) -> Result<ImageMetadata> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| Error::malformed(format!("not valid UTF-8: {e}")))?;

        let document: Value =
            serde_yaml::from_str(text).map_err(|e| Error::malformed(e.to_string()))?;

        let Value::Mapping(map) = document else {
            return Err(Error::malformed("top level is not a mapping"));
        };

        ImageMetadata::new(
            required_field(&map, REGISTRY_PATH_KEY)?,
            required_field(&map, USERNAME_KEY)?,
            required_field(&map, PASSWORD_KEY)?,
        )
    }
}

fn required_field(map: &Mapping, key: &str) -> Result<String> {
    match map.get(key) {
        None | Some(Value::Null) => Err(Error::incomplete(key, "is missing")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(_) => Err(Error::malformed(format!("field '{key}' must be a scalar"))),
    }
}
