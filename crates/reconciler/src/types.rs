//! Core types for the reconciler.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ErrorKind, Result};

/// Image registry credentials parsed from a resource.
///
/// All three fields are non-empty; construction goes through
/// [`ImageMetadata::new`], which enforces that.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    #[serde(rename = "registrypath")]
    registry_path: String,
    username: String,
    password: String,
}

impl ImageMetadata {
    /// Create validated image metadata.
    ///
    /// # Errors
    ///
    /// Returns `IncompleteMetadata` naming the first blank field.
    pub fn new(
        registry_path: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let metadata = Self {
            registry_path: registry_path.into(),
            username: username.into(),
            password: password.into(),
        };

        let blank = [
            ("registrypath", &metadata.registry_path),
            ("username", &metadata.username),
            ("password", &metadata.password),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field);

        match blank {
            Some(field) => Err(Error::incomplete(field, "is empty")),
            None => Ok(metadata),
        }
    }

    pub fn registry_path(&self) -> &str {
        &self.registry_path
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for ImageMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageMetadata")
            .field("registry_path", &self.registry_path)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Rendered desired state for one target.
///
/// A value: produced fresh by every render and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredSpec {
    target: String,
    document: String,
}

impl DesiredSpec {
    pub(crate) fn new(target: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            document: document.into(),
        }
    }

    /// Workload the spec is for.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The rendered document.
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Hex SHA-256 of the document.
    pub fn fingerprint(&self) -> String {
        format!("{:x}", Sha256::digest(self.document.as_bytes()))
    }
}

/// Pipeline states of a single reconcile call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReconcileState {
    Idle,
    Fetching,
    Parsing,
    Rendering,
    Applying,
    Succeeded,
    Failed,
}

impl ReconcileState {
    /// Whether the state ends the pipeline.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether `next` may follow `self`.
    ///
    /// Stages run strictly in order; any non-terminal state may fail.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Fetching)
                | (Self::Fetching, Self::Parsing)
                | (Self::Parsing, Self::Rendering)
                | (Self::Rendering, Self::Applying)
                | (Self::Applying, Self::Succeeded)
                | (
                    Self::Idle
                        | Self::Fetching
                        | Self::Parsing
                        | Self::Rendering
                        | Self::Applying,
                    Self::Failed
                )
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Rendering => "rendering",
            Self::Applying => "applying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a reconcile call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Taxonomy kind.
    pub kind: ErrorKind,
    /// State the pipeline was in when the error occurred.
    pub stage: ReconcileState,
    /// `"<stage>: <cause>"`.
    pub detail: String,
}

impl Failure {
    pub(crate) fn new(stage: ReconcileState, error: &Error) -> Self {
        Self {
            kind: error.kind(),
            stage,
            detail: format!("{stage}: {error}"),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.detail, self.kind)
    }
}

/// Outcome of one reconcile call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileResult {
    /// The spec was accepted by the sink.
    Applied(DesiredSpec),
    /// A stage failed; nothing after it ran.
    Failed(Failure),
}

impl ReconcileResult {
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The applied spec, if any.
    pub const fn spec(&self) -> Option<&DesiredSpec> {
        match self {
            Self::Applied(spec) => Some(spec),
            Self::Failed(_) => None,
        }
    }

    /// The failure, if any.
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Applied(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    /// Failure kind, if any.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.failure().map(|f| f.kind)
    }
}

/// Lifecycle events a hosting runtime may deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecycleEvent {
    Install,
    Start,
    ConfigChanged,
    UpgradeCharm,
    UpdateStatus,
    Stop,
    Remove,
}

impl LifecycleEvent {
    pub const ALL: [Self; 7] = [
        Self::Install,
        Self::Start,
        Self::ConfigChanged,
        Self::UpgradeCharm,
        Self::UpdateStatus,
        Self::Stop,
        Self::Remove,
    ];

    /// Hook name, e.g. `config-changed`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start => "start",
            Self::ConfigChanged => "config-changed",
            Self::UpgradeCharm => "upgrade-charm",
            Self::UpdateStatus => "update-status",
            Self::Stop => "stop",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a hook name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lifecycle event '{0}'")]
pub struct UnknownEvent(pub String);

impl FromStr for LifecycleEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == normalized)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// What triggered a reconcile, plus its cancellation handle.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub event: LifecycleEvent,
    pub cancel: CancellationToken,
}

impl TriggerContext {
    /// Trigger with a fresh, uncanceled token.
    pub fn new(event: LifecycleEvent) -> Self {
        Self::with_cancel(event, CancellationToken::new())
    }

    /// Trigger sharing a caller-owned token.
    pub fn with_cancel(event: LifecycleEvent, cancel: CancellationToken) -> Self {
        Self { event, cancel }
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
