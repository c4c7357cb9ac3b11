//! Wires a charm directory to a reconciler.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use podspec_core::{CharmDir, Configuration, Override};
use podspec_reconciler::{
    DEFAULT_ENV_PREFIX, DEFAULT_TEMPLATE, DesiredSpec, FileStateSink, FilesystemResourceStore,
    Reconciler, TemplateStore, TracingObserver, TriggerContext,
};
use tracing::{debug, info};

use crate::dispatch::{Dispatcher, ReconcileHandler};

/// Resource holding the workload image metadata.
pub const DEFAULT_RESOURCE: &str = "bitcoind";

/// Inputs needed to assemble a [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub charm_dir: PathBuf,
    pub output_dir: PathBuf,
    pub overrides: Vec<Override>,
    pub resource: String,
    pub template: String,
    pub env_prefix: String,
}

impl RuntimeOptions {
    pub fn new(charm_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            charm_dir: charm_dir.into(),
            output_dir: output_dir.into(),
            overrides: Vec::new(),
            resource: DEFAULT_RESOURCE.to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    #[must_use]
    pub fn with_override(mut self, ov: Override) -> Self {
        self.overrides.push(ov);
        self
    }
}

/// A loaded charm: the reconciler for its workload plus the config snapshot.
pub struct Runtime {
    reconciler: Arc<Reconciler>,
    config: Configuration,
    output: FileStateSink,
}

impl Runtime {
    /// Load the charm and build the reconciler.
    ///
    /// # Errors
    ///
    /// Fails if the charm directory, `metadata.yaml` or `config.yaml` cannot
    /// be read, if the resource is not declared, or if an override is
    /// unknown or ill-typed.
    pub fn load(options: &RuntimeOptions) -> Result<Self> {
        let charm = CharmDir::open(&options.charm_dir).context("Failed to open charm directory")?;
        let metadata = charm.metadata().context("Failed to load charm metadata")?;
        metadata
            .require_resource(&options.resource)
            .context("Charm does not declare the image resource")?;

        let config = charm
            .options()
            .and_then(|opts| opts.snapshot(&options.overrides))
            .context("Failed to build configuration snapshot")?;
        debug!(keys = config.len(), "Configuration snapshot built");

        let output = FileStateSink::new(&options.output_dir);
        let reconciler = Reconciler::builder()
            .with_resources(Arc::new(FilesystemResourceStore::new(charm.resources_dir())))
            .with_sink(Arc::new(output.clone()))
            .with_templates(TemplateStore::from_dir(charm.templates_dir()))
            .with_observer(Arc::new(TracingObserver))
            .target(metadata.name.clone())
            .resource(options.resource.clone())
            .template(options.template.clone())
            .env_prefix(options.env_prefix.clone())
            .build()
            .context("Failed to build reconciler")?;

        info!(
            charm = %metadata.name,
            root = %charm.root().display(),
            "Charm loaded"
        );

        Ok(Self {
            reconciler: Arc::new(reconciler),
            config,
            output,
        })
    }

    /// Dispatch table for this charm.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::reconciling(Arc::new(ReconcileHandler::new(
            Arc::clone(&self.reconciler),
            self.config.clone(),
        )))
    }

    /// Render the desired spec without applying it.
    ///
    /// # Errors
    ///
    /// Fails if fetch, parse or render fails, or the trigger is canceled.
    pub async fn plan(&self, trigger: &TriggerContext) -> Result<DesiredSpec> {
        self.reconciler
            .plan(trigger, &self.config)
            .await
            .context("Failed to render desired spec")
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn target(&self) -> &str {
        &self.reconciler.config().target
    }

    /// Where the applied spec for this charm is written.
    pub fn output_path(&self) -> PathBuf {
        self.output.path_for(self.target())
    }
}
