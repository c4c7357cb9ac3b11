//! Reconciler implementation.

use std::sync::Arc;

use podspec_core::Configuration;
use tokio::sync::OwnedMutexGuard;

use crate::error::{Error, Result};
use crate::lock::TargetLocks;
use crate::metadata::MetadataParser;
use crate::observe::{NoopObserver, ReconcileEvent, ReconcileObserver};
use crate::render::{DEFAULT_ENV_PREFIX, DEFAULT_TEMPLATE, EnvConfig, SpecRenderer, TemplateStore};
use crate::sink::StateSink;
use crate::store::ResourceStore;
use crate::types::{DesiredSpec, Failure, ReconcileResult, ReconcileState, TriggerContext};

/// Configuration for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Workload name; also the identity the reconcile guard is keyed by.
    pub target: String,
    /// Resource holding the image metadata.
    pub resource: String,
    /// Template rendered into the desired spec.
    pub template: String,
    /// Config keys with this prefix become environment variables.
    pub env_prefix: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            target: "bitcoind".to_string(),
            resource: "bitcoind".to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }
}

/// Errors raised while assembling a [`Reconciler`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("reconciler requires a {0}")]
    Missing(&'static str),
    #[error("invalid reconciler config: {0} must not be empty")]
    Empty(&'static str),
}

/// State tracking for one reconcile call.
struct Run<'a> {
    target: &'a str,
    state: ReconcileState,
    observer: &'a dyn ReconcileObserver,
}

impl<'a> Run<'a> {
    fn new(target: &'a str, observer: &'a dyn ReconcileObserver) -> Self {
        Self {
            target,
            state: ReconcileState::Idle,
            observer,
        }
    }

    /// Move to the next stage unless the trigger was canceled.
    fn advance(&mut self, next: ReconcileState, trigger: &TriggerContext) -> Result<()> {
        if trigger.is_canceled() {
            return Err(Error::Canceled);
        }
        self.transition(next);
        Ok(())
    }

    fn transition(&mut self, next: ReconcileState) {
        debug_assert!(
            !self.state.is_terminal() && self.state.can_transition_to(next),
            "illegal reconcile transition"
        );
        self.observer.observe(&ReconcileEvent::Transition {
            target: self.target.to_string(),
            from: self.state,
            to: next,
        });
        self.state = next;
    }

    fn note(&self, event: ReconcileEvent) {
        self.observer.observe(&event);
    }
}

/// Derives the desired spec for one workload and hands it to a sink.
///
/// Each call runs `Fetching -> Parsing -> Rendering -> Applying` and ends in
/// `Succeeded` or `Failed`. A failing stage short-circuits the rest, so a
/// half-built spec is never applied. Nothing is retried here.
pub struct Reconciler {
    resources: Arc<dyn ResourceStore>,
    parser: MetadataParser,
    renderer: SpecRenderer,
    sink: Arc<dyn StateSink>,
    observer: Arc<dyn ReconcileObserver>,
    locks: Arc<TargetLocks>,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Start building a reconciler.
    pub fn builder() -> ReconcilerBuilder {
        ReconcilerBuilder::new()
    }

    /// Reconcile the target once.
    ///
    /// Holds the target's guard for the whole pipeline. Cancellation is
    /// honoured up to the transition into `Applying`; after that the sink's
    /// answer decides the outcome.
    pub async fn reconcile(
        &self,
        trigger: &TriggerContext,
        config: &Configuration,
    ) -> ReconcileResult {
        let mut run = Run::new(&self.config.target, self.observer.as_ref());

        match self.run_pipeline(&mut run, trigger, config).await {
            Ok(spec) => {
                run.transition(ReconcileState::Succeeded);
                run.note(ReconcileEvent::Applied {
                    target: self.config.target.clone(),
                    fingerprint: spec.fingerprint(),
                });
                ReconcileResult::Applied(spec)
            }
            Err(err) => {
                let failure = Failure::new(run.state, &err);
                run.transition(ReconcileState::Failed);
                run.note(ReconcileEvent::Failed {
                    target: self.config.target.clone(),
                    failure: failure.clone(),
                });
                ReconcileResult::Failed(failure)
            }
        }
    }

    /// Compute the desired spec without applying it.
    ///
    /// # Errors
    ///
    /// Any fetch, parse or render error, or `Canceled`.
    pub async fn plan(
        &self,
        trigger: &TriggerContext,
        config: &Configuration,
    ) -> Result<DesiredSpec> {
        let mut run = Run::new(&self.config.target, self.observer.as_ref());
        self.desired_state(&mut run, trigger, config).await
    }

    async fn run_pipeline(
        &self,
        run: &mut Run<'_>,
        trigger: &TriggerContext,
        config: &Configuration,
    ) -> Result<DesiredSpec> {
        let _guard = self.acquire(trigger).await?;

        let spec = self.desired_state(run, trigger, config).await?;

        run.advance(ReconcileState::Applying, trigger)?;
        self.sink.apply(&spec).await.map_err(|err| match err {
            Error::ApplyFailed { .. } => err,
            other => Error::apply_failed(spec.target(), other.to_string()),
        })?;

        Ok(spec)
    }

    async fn desired_state(
        &self,
        run: &mut Run<'_>,
        trigger: &TriggerContext,
        config: &Configuration,
    ) -> Result<DesiredSpec> {
        run.advance(ReconcileState::Fetching, trigger)?;
        let raw = tokio::select! {
            biased;
            () = trigger.cancel.cancelled() => return Err(Error::Canceled),
            fetched = self.resources.fetch(&self.config.resource) => fetched?,
        };

        run.advance(ReconcileState::Parsing, trigger)?;
        let metadata = self.parser.parse(&raw)?;

        run.advance(ReconcileState::Rendering, trigger)?;
        let ignored = EnvConfig::ignored_keys(self.renderer.env_prefix(), config);
        if ignored > 0 {
            run.note(ReconcileEvent::KeysIgnored {
                target: self.config.target.clone(),
                count: ignored,
            });
        }
        self.renderer
            .render(&self.config.target, &metadata, config)
            .await
    }

    async fn acquire(&self, trigger: &TriggerContext) -> Result<OwnedMutexGuard<()>> {
        if trigger.is_canceled() {
            return Err(Error::Canceled);
        }
        tokio::select! {
            biased;
            () = trigger.cancel.cancelled() => Err(Error::Canceled),
            guard = self.locks.acquire(&self.config.target) => Ok(guard),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Get the guard table.
    pub fn locks(&self) -> &Arc<TargetLocks> {
        &self.locks
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    resources: Option<Arc<dyn ResourceStore>>,
    sink: Option<Arc<dyn StateSink>>,
    templates: Option<TemplateStore>,
    observer: Option<Arc<dyn ReconcileObserver>>,
    locks: Option<Arc<TargetLocks>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            resources: None,
            sink: None,
            templates: None,
            observer: None,
            locks: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the resource store.
    #[must_use]
    pub fn with_resources(mut self, resources: Arc<dyn ResourceStore>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Set the state sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn StateSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set where templates come from.
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateStore) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Set the observer. Defaults to [`NoopObserver`].
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ReconcileObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Share a guard table with other reconcilers.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<TargetLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the workload name.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.config.target = target.into();
        self
    }

    /// Set the resource name.
    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.config.resource = resource.into();
        self
    }

    /// Set the template name.
    #[must_use]
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.config.template = template.into();
        self
    }

    /// Set the environment prefix.
    #[must_use]
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.env_prefix = prefix.into();
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Fails if the resource store, sink or templates are missing, or if the
    /// target, resource, template or environment prefix is empty.
    pub fn build(self) -> std::result::Result<Reconciler, BuildError> {
        let resources = self.resources.ok_or(BuildError::Missing("resource store"))?;
        let sink = self.sink.ok_or(BuildError::Missing("state sink"))?;
        let templates = self.templates.ok_or(BuildError::Missing("template store"))?;

        for (field, value) in [
            ("target", &self.config.target),
            ("resource", &self.config.resource),
            ("template", &self.config.template),
            ("env_prefix", &self.config.env_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(BuildError::Empty(field));
            }
        }

        let renderer = SpecRenderer::new(templates, self.config.template.clone())
            .with_env_prefix(self.config.env_prefix.clone());

        Ok(Reconciler {
            resources,
            parser: MetadataParser::new(),
            renderer,
            sink,
            observer: self.observer.unwrap_or_else(|| Arc::new(NoopObserver)),
            locks: self.locks.unwrap_or_default(),
            config: self.config,
        })
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
