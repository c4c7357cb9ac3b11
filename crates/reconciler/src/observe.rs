//! Observability sink for reconcile runs.
//!
//! The reconciler never logs on its own; it reports structured
//! [`ReconcileEvent`]s to an injected [`ReconcileObserver`].

use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use crate::error::ErrorClass;
use crate::types::{Failure, ReconcileState};

/// Something worth reporting about a reconcile run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// The pipeline moved to a new state.
    Transition {
        target: String,
        from: ReconcileState,
        to: ReconcileState,
    },
    /// Config keys outside the environment prefix were skipped.
    KeysIgnored { target: String, count: usize },
    /// The sink accepted the spec.
    Applied { target: String, fingerprint: String },
    /// The run failed.
    Failed { target: String, failure: Failure },
}

impl ReconcileEvent {
    pub fn target(&self) -> &str {
        match self {
            Self::Transition { target, .. }
            | Self::KeysIgnored { target, .. }
            | Self::Applied { target, .. }
            | Self::Failed { target, .. } => target,
        }
    }
}

/// Receives reconcile events.
pub trait ReconcileObserver: Send + Sync {
    fn observe(&self, event: &ReconcileEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ReconcileObserver for NoopObserver {
    fn observe(&self, _event: &ReconcileEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ReconcileObserver for TracingObserver {
    fn observe(&self, event: &ReconcileEvent) {
        match event {
            ReconcileEvent::Transition { target, from, to } => {
                debug!(target_name = %target, %from, %to, "Reconcile state changed");
            }
            ReconcileEvent::KeysIgnored { target, count } => {
                debug!(target_name = %target, count, "Config keys outside prefix ignored");
            }
            ReconcileEvent::Applied {
                target,
                fingerprint,
            } => {
                info!(target_name = %target, %fingerprint, "Desired spec applied");
            }
            ReconcileEvent::Failed { target, failure } => match failure.kind.class() {
                ErrorClass::Configuration => {
                    error!(target_name = %target, kind = %failure.kind, detail = %failure.detail, "Reconcile blocked");
                }
                ErrorClass::Recoverable | ErrorClass::Canceled => {
                    warn!(target_name = %target, kind = %failure.kind, detail = %failure.detail, "Reconcile failed");
                }
            },
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ReconcileEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<ReconcileEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// States entered, in order.
    pub fn states(&self) -> Vec<ReconcileState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReconcileEvent::Transition { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }
}

impl ReconcileObserver for RecordingObserver {
    fn observe(&self, event: &ReconcileEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_tracks_states() {
        let observer = RecordingObserver::new();
        observer.observe(&ReconcileEvent::Transition {
            target: "bitcoind".to_string(),
            from: ReconcileState::Idle,
            to: ReconcileState::Fetching,
        });
        observer.observe(&ReconcileEvent::KeysIgnored {
            target: "bitcoind".to_string(),
            count: 2,
        });

        assert_eq!(observer.events().len(), 2);
        assert_eq!(observer.states(), vec![ReconcileState::Fetching]);
        assert!(observer.events().iter().all(|e| e.target() == "bitcoind"));
    }
}
