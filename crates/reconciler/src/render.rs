//! Desired spec rendering.
//!
//! Builds the workload environment from prefixed configuration keys and
//! renders a named template against:
//!
//! | variable        | value                                     |
//! |-----------------|-------------------------------------------|
//! | `name`          | workload name                             |
//! | `environment`   | `{BTC_RPCUSER: "alice", ...}`             |
//! | `registry_path` | image path from the resource              |
//! | `username`      | registry username                         |
//! | `password`      | registry password                         |
//!
//! Undefined variables are errors. The output must be a YAML mapping.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use minijinja::{Environment, UndefinedBehavior};
use podspec_core::{ConfigValue, Configuration};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{DesiredSpec, ImageMetadata};

/// Config keys starting with this feed the environment by default.
pub const DEFAULT_ENV_PREFIX: &str = "btc";

/// Template rendered by default.
pub const DEFAULT_TEMPLATE: &str = "spec_template.yaml";

/// Canonical environment key for a config key: `btc-rpc.user` -> `BTC_RPC_USER`.
pub fn env_key(key: &str) -> String {
    key.to_uppercase().replace(['-', '.'], "_")
}

/// Environment variables derived from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EnvConfig {
    vars: BTreeMap<String, ConfigValue>,
}

impl EnvConfig {
    /// Collect every key starting with `prefix`, canonicalized.
    ///
    /// Keys without the prefix are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ConfigCollision` when two keys canonicalize to the same name.
    pub fn from_config(prefix: &str, config: &Configuration) -> Result<Self> {
        let mut sources: BTreeMap<String, &str> = BTreeMap::new();
        let mut vars = BTreeMap::new();

        for (key, value) in config.iter().filter(|(k, _)| k.starts_with(prefix)) {
            let canonical = env_key(key);
            match sources.entry(canonical.clone()) {
                Entry::Occupied(existing) => {
                    return Err(Error::collision(canonical, *existing.get(), key));
                }
                Entry::Vacant(slot) => {
                    slot.insert(key);
                }
            }
            vars.insert(canonical, value.clone());
        }

        Ok(Self { vars })
    }

    /// Number of config keys that do not carry `prefix`.
    pub fn ignored_keys(prefix: &str, config: &Configuration) -> usize {
        config.iter().filter(|(k, _)| !k.starts_with(prefix)).count()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.vars.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Where templates are looked up.
///
/// On disk this is the `templates/` directory of the charm; templates can
/// also be registered in memory, which take precedence.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    dir: Option<PathBuf>,
    inline: BTreeMap<String, String>,
}

impl TemplateStore {
    /// Templates read from `dir`.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            inline: BTreeMap::new(),
        }
    }

    /// Empty store with no directory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Register a template by name.
    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.inline.insert(name.into(), source.into());
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Load a template's source.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` if no template with that name exists, and
    /// `TemplateRenderError` if the file exists but cannot be read as UTF-8.
    pub async fn load(&self, name: &str) -> Result<String> {
        if let Some(source) = self.inline.get(name) {
            return Ok(source.clone());
        }

        let is_flat = !name.is_empty() && !name.contains(['/', '\\']) && name != "..";
        let Some(dir) = self.dir.as_ref().filter(|_| is_flat) else {
            return Err(Error::template_not_found(name));
        };

        let path = dir.join(name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| match e.kind() {
                IoErrorKind::NotFound => Error::template_not_found(name),
                _ => Error::template_render(name, format!("{}: {e}", path.display())),
            })
    }
}

#[derive(Serialize)]
struct RenderContext<'a> {
    name: &'a str,
    environment: &'a EnvConfig,
    registry_path: &'a str,
    username: &'a str,
    password: &'a str,
}

/// Renders [`DesiredSpec`]s from a fixed template.
///
/// Pure: the output depends only on the arguments and the template source.
pub struct SpecRenderer {
    env: Environment<'static>,
    templates: TemplateStore,
    template: String,
    env_prefix: String,
}

impl SpecRenderer {
    /// Renderer for `template`, using the default environment prefix.
    pub fn new(templates: TemplateStore, template: impl Into<String>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        Self {
            env,
            templates,
            template: template.into(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// Change the config key prefix that feeds the environment.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the desired spec for workload `name`.
    ///
    /// # Errors
    ///
    /// `ConfigCollision` from environment construction, `TemplateNotFound`
    /// if the template is missing, `TemplateRenderError` if it cannot be
    /// read, rendering fails or the output is not a YAML mapping.
    pub async fn render(
        &self,
        name: &str,
        metadata: &ImageMetadata,
        config: &Configuration,
    ) -> Result<DesiredSpec> {
        let environment = EnvConfig::from_config(&self.env_prefix, config)?;
        let source = self.templates.load(&self.template).await?;
        self.render_with(name, &source, &environment, metadata)
    }

    /// Render `source` directly, bypassing the template store.
    ///
    /// # Errors
    ///
    /// As [`SpecRenderer::render`], minus the template lookup.
    pub fn render_source(
        &self,
        name: &str,
        source: &str,
        metadata: &ImageMetadata,
        config: &Configuration,
    ) -> Result<DesiredSpec> {
        let environment = EnvConfig::from_config(&self.env_prefix, config)?;
        self.render_with(name, source, &environment, metadata)
    }

    fn render_with(
        &self,
        name: &str,
        source: &str,
        environment: &EnvConfig,
        metadata: &ImageMetadata,
    ) -> Result<DesiredSpec> {
        let ctx = RenderContext {
            name,
            environment,
            registry_path: metadata.registry_path(),
            username: metadata.username(),
            password: metadata.password(),
        };

        let document = self
            .env
            .render_named_str(&self.template, source, &ctx)
            .map_err(|e| Error::template_render(&self.template, e.to_string()))?;

        self.validate(&document)?;
        Ok(DesiredSpec::new(name, document))
    }

    fn validate(&self, document: &str) -> Result<()> {
        match serde_yaml::from_str::<serde_yaml::Value>(document) {
            Ok(serde_yaml::Value::Mapping(_)) => Ok(()),
            Ok(_) => Err(Error::template_render(
                &self.template,
                "output is not a YAML mapping",
            )),
            Err(e) => Err(Error::template_render(
                &self.template,
                format!("output is not valid YAML: {e}"),
            )),
        }
    }
}
