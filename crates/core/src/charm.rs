//! Charm directory layout: `metadata.yaml`, `config.yaml`, templates and
//! resource blobs.
//!
//! ```text
//! <charm>/metadata.yaml
//! <charm>/config.yaml
//! <charm>/templates/<name>
//! <charm>/resources/<name>.yaml
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use itertools::Itertools;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::{ConfigValue, Configuration};
use crate::error::{Error, Result};

/// Conventional subdirectory holding spec templates.
pub const TEMPLATES_DIR: &str = "templates";

/// Conventional subdirectory holding resource blobs.
pub const RESOURCES_DIR: &str = "resources";

const METADATA_FILE: &str = "metadata.yaml";
const CONFIG_FILE: &str = "config.yaml";

/// Contents of `metadata.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CharmMetadata {
    /// Application name; also the workload target name.
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
    /// Resources the charm expects to be attached.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDecl>,
}

/// A resource declared in `metadata.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDecl {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CharmMetadata {
    /// Look up a declared resource.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMetadata` when `name` is not declared.
    pub fn require_resource(&self, name: &str) -> Result<&ResourceDecl> {
        self.resources.get(name).ok_or_else(|| {
            Error::invalid_metadata(format!(
                "resource '{name}' is not declared (declared: {})",
                self.resources.keys().join(", ")
            ))
        })
    }
}

/// Option type as written in `config.yaml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    String,
    Int,
    Float,
    Boolean,
}

impl OptionType {
    /// Check a YAML default against the declared type.
    fn check(self, key: &str, value: &serde_yaml::Value) -> Result<ConfigValue> {
        let scalar = ConfigValue::from_yaml(value)
            .ok_or_else(|| Error::invalid_option(key, "default must be a scalar"))?;

        match (self, scalar) {
            (Self::String, v @ ConfigValue::String(_))
            | (Self::Int, v @ ConfigValue::Int(_))
            | (Self::Float, v @ ConfigValue::Float(_))
            | (Self::Boolean, v @ ConfigValue::Bool(_)) => Ok(v),
            // YAML writes `1.0` as a float but `1` as an int; both are valid floats
            #[allow(clippy::cast_precision_loss)]
            (Self::Float, ConfigValue::Int(i)) => Ok(ConfigValue::Float(i as f64)),
            (expected, other) => Err(Error::invalid_option(
                key,
                format!(
                    "default has type {} but option is declared {expected:?}",
                    other.type_name()
                ),
            )),
        }
    }

    /// Coerce a raw override string into the declared type.
    fn coerce(self, key: &str, raw: &str) -> Result<ConfigValue> {
        let invalid = |what: &str| Error::invalid_option(key, format!("'{raw}' is not a valid {what}"));
        match self {
            Self::String => Ok(ConfigValue::String(raw.to_string())),
            Self::Int => raw
                .trim()
                .parse::<i64>()
                .map(ConfigValue::Int)
                .map_err(|_| invalid("int")),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .map(ConfigValue::Float)
                .map_err(|_| invalid("float")),
            Self::Boolean => raw
                .trim()
                .parse::<bool>()
                .map(ConfigValue::Bool)
                .map_err(|_| invalid("boolean")),
        }
    }
}

/// A single option declared in `config.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionSpec {
    #[serde(rename = "type")]
    pub kind: OptionType,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Contents of `config.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharmOptions {
    #[serde(default)]
    pub options: BTreeMap<String, OptionSpec>,
}

impl CharmOptions {
    /// Build a configuration snapshot from option defaults and overrides.
    ///
    /// Options without a default stay unset unless overridden.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOption` for an override naming an undeclared option,
    /// and `InvalidOption` when a default or override does not fit the
    /// declared type.
    pub fn snapshot(&self, overrides: &[Override]) -> Result<Configuration> {
        let mut config = Configuration::new();

        for (key, spec) in &self.options {
            if let Some(default) = spec.default.as_ref().filter(|v| !v.is_null()) {
                config.insert(key.clone(), spec.kind.check(key, default)?);
            }
        }

        for ov in overrides {
            let spec = self
                .options
                .get(&ov.key)
                .ok_or_else(|| Error::unknown_option(&ov.key))?;
            config.insert(ov.key.clone(), spec.kind.coerce(&ov.key, &ov.raw)?);
        }

        Ok(config)
    }
}

/// A `KEY=VALUE` config override from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub key: String,
    pub raw: String,
}

impl FromStr for Override {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((key, raw)) if !key.trim().is_empty() => Ok(Self {
                key: key.trim().to_string(),
                raw: raw.to_string(),
            }),
            _ => Err(Error::MalformedOverride { raw: s.to_string() }),
        }
    }
}

/// A charm directory on disk.
#[derive(Debug, Clone)]
pub struct CharmDir {
    root: PathBuf,
}

impl CharmDir {
    /// Open a charm directory.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryNotFound` if `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.is_dir() {
            Ok(Self { root })
        } else {
            Err(Error::DirectoryNotFound { path: root })
        }
    }

    /// Root of the charm.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory templates are looked up in.
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    /// Directory resource blobs are read from.
    pub fn resources_dir(&self) -> PathBuf {
        self.root.join(RESOURCES_DIR)
    }

    /// Load `metadata.yaml`.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, not valid YAML, or has an empty name.
    pub fn metadata(&self) -> Result<CharmMetadata> {
        let metadata: CharmMetadata = read_yaml(&self.root.join(METADATA_FILE))?;
        if metadata.name.trim().is_empty() {
            return Err(Error::invalid_metadata("name must not be empty"));
        }
        Ok(metadata)
    }

    /// Load `config.yaml`. A charm without one has no options.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn options(&self) -> Result<CharmOptions> {
        let path = self.root.join(CONFIG_FILE);
        if path.exists() {
            read_yaml(&path)
        } else {
            Ok(CharmOptions::default())
        }
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
    serde_yaml::from_str(&text).map_err(|e| Error::yaml_parse_failed(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG_YAML: &str = r#"
options:
  btc-rpcuser:
    type: string
    default: bitcoin
    description: RPC user
  btc-rpcport:
    type: int
    default: 8332
  btc-txindex:
    type: boolean
  btc-fee:
    type: float
    default: 1
"#;

    fn options() -> CharmOptions {
        serde_yaml::from_str(CONFIG_YAML).unwrap_or_default()
    }

    #[test]
    fn test_snapshot_uses_defaults() -> Result<()> {
        let config = options().snapshot(&[])?;

        assert_eq!(config.get("btc-rpcuser"), Some(&ConfigValue::from("bitcoin")));
        assert_eq!(config.get("btc-rpcport"), Some(&ConfigValue::Int(8332)));
        assert_eq!(config.get("btc-fee"), Some(&ConfigValue::Float(1.0)));
        assert!(config.get("btc-txindex").is_none());
        Ok(())
    }

    #[test]
    fn test_snapshot_applies_overrides_with_declared_type() -> Result<()> {
        let overrides = [
            "btc-rpcuser=alice".parse::<Override>()?,
            "btc-txindex=true".parse::<Override>()?,
            "btc-rpcport=18332".parse::<Override>()?,
        ];
        let config = options().snapshot(&overrides)?;

        assert_eq!(config.get("btc-rpcuser"), Some(&ConfigValue::from("alice")));
        assert_eq!(config.get("btc-txindex"), Some(&ConfigValue::Bool(true)));
        assert_eq!(config.get("btc-rpcport"), Some(&ConfigValue::Int(18332)));
        Ok(())
    }

    #[test]
    fn test_string_option_keeps_numeric_override_as_string() -> Result<()> {
        let config = options().snapshot(&["btc-rpcuser=1234".parse()?])?;
        assert_eq!(config.get("btc-rpcuser"), Some(&ConfigValue::from("1234")));
        Ok(())
    }

    #[test]
    fn test_unknown_override_rejected() -> Result<()> {
        let result = options().snapshot(&["nope=1".parse()?]);
        assert!(matches!(result, Err(Error::UnknownOption { ref key }) if key == "nope"));
        Ok(())
    }

    #[test]
    fn test_override_type_mismatch_rejected() -> Result<()> {
        let result = options().snapshot(&["btc-rpcport=lots".parse()?]);
        assert!(matches!(result, Err(Error::InvalidOption { .. })));
        Ok(())
    }

    #[test]
    fn test_default_type_mismatch_rejected() {
        let opts: CharmOptions =
            serde_yaml::from_str("options:\n  x:\n    type: int\n    default: abc\n")
                .unwrap_or_default();
        assert!(matches!(opts.snapshot(&[]), Err(Error::InvalidOption { .. })));
    }

    #[test]
    fn test_override_parse() {
        assert!("=value".parse::<Override>().is_err());
        assert!("novalue".parse::<Override>().is_err());
        assert_eq!(
            "k=a=b".parse::<Override>().ok(),
            Some(Override {
                key: "k".to_string(),
                raw: "a=b".to_string()
            })
        );
    }

    #[test]
    fn test_charm_dir_loads_files() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path().join("metadata.yaml"),
            "name: bitcoind\nresources:\n  bitcoind:\n    type: oci-image\n",
        )?;
        std::fs::write(dir.path().join("config.yaml"), CONFIG_YAML)?;

        let charm = CharmDir::open(dir.path())?;
        let metadata = charm.metadata()?;
        assert_eq!(metadata.name, "bitcoind");
        assert!(metadata.require_resource("bitcoind").is_ok());
        assert!(metadata.require_resource("other").is_err());
        assert_eq!(charm.options()?.options.len(), 4);
        assert_eq!(charm.templates_dir(), dir.path().join("templates"));
        Ok(())
    }

    #[test]
    fn test_charm_dir_without_config_has_no_options() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let charm = CharmDir::open(dir.path())?;
        assert!(charm.options()?.options.is_empty());
        assert!(charm.metadata().is_err());
        Ok(())
    }

    #[test]
    fn test_open_missing_directory() {
        let result = CharmDir::open("/definitely/not/a/charm");
        assert!(matches!(result, Err(Error::DirectoryNotFound { .. })));
    }
}
