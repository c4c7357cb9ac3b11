//! Lifecycle event dispatch.
//!
//! Events are routed through an explicit table. Only `start`,
//! `config-changed` and `upgrade-charm` reconcile by default; any event
//! without a handler is ignored.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use podspec_core::Configuration;
use podspec_reconciler::{LifecycleEvent, ReconcileResult, Reconciler, TriggerContext};
use tracing::debug;

use crate::status::UnitStatus;

/// Events that trigger a reconcile.
pub const RECONCILE_EVENTS: [LifecycleEvent; 3] = [
    LifecycleEvent::Start,
    LifecycleEvent::ConfigChanged,
    LifecycleEvent::UpgradeCharm,
];

/// Handles one lifecycle event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, trigger: &TriggerContext) -> ReconcileResult;
}

/// Runs a reconcile against a fixed configuration snapshot.
pub struct ReconcileHandler {
    reconciler: Arc<Reconciler>,
    config: Configuration,
}

impl ReconcileHandler {
    pub fn new(reconciler: Arc<Reconciler>, config: Configuration) -> Self {
        Self { reconciler, config }
    }
}

#[async_trait]
impl EventHandler for ReconcileHandler {
    async fn handle(&self, trigger: &TriggerContext) -> ReconcileResult {
        self.reconciler.reconcile(trigger, &self.config).await
    }
}

/// What happened to a dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled(ReconcileResult),
    Ignored,
}

impl DispatchOutcome {
    /// Status to report, if the event changed anything.
    pub fn status(&self) -> Option<UnitStatus> {
        match self {
            Self::Handled(result) => Some(UnitStatus::from_result(result)),
            Self::Ignored => None,
        }
    }
}

/// Table from lifecycle event to handler.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<LifecycleEvent, Arc<dyn EventHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to every event in [`RECONCILE_EVENTS`].
    pub fn reconciling(handler: Arc<dyn EventHandler>) -> Self {
        RECONCILE_EVENTS
            .into_iter()
            .fold(Self::new(), |dispatcher, event| {
                dispatcher.bind(event, Arc::clone(&handler))
            })
    }

    /// Bind a handler, replacing any previous one for `event`.
    #[must_use]
    pub fn bind(mut self, event: LifecycleEvent, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(event, handler);
        self
    }

    pub fn is_bound(&self, event: LifecycleEvent) -> bool {
        self.handlers.contains_key(&event)
    }

    pub async fn dispatch(&self, trigger: &TriggerContext) -> DispatchOutcome {
        match self.handlers.get(&trigger.event) {
            Some(handler) => DispatchOutcome::Handled(handler.handle(trigger).await),
            None => {
                debug!(event = %trigger.event, "No handler bound, ignoring event");
                DispatchOutcome::Ignored
            }
        }
    }
}
