//! Unit status reported after a hook.

use std::fmt;

use podspec_reconciler::{ErrorClass, ReconcileResult};

/// Workload status as shown to an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// The desired spec is applied.
    Active,
    /// Work in progress, or interrupted before it finished.
    Maintenance(String),
    /// A dependency is not ready yet; a later hook may succeed.
    Waiting(String),
    /// Operator action is required (bad config, resource or template).
    Blocked(String),
}

impl UnitStatus {
    /// Status while a hook is running.
    pub fn reconciling() -> Self {
        Self::Maintenance("reconciling".to_string())
    }

    /// Map a reconcile outcome to a status.
    pub fn from_result(result: &ReconcileResult) -> Self {
        match result {
            ReconcileResult::Applied(_) => Self::Active,
            ReconcileResult::Failed(failure) => {
                let detail = failure.detail.clone();
                match failure.kind.class() {
                    ErrorClass::Recoverable => Self::Waiting(detail),
                    ErrorClass::Configuration => Self::Blocked(detail),
                    ErrorClass::Canceled => Self::Maintenance(detail),
                }
            }
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Maintenance(_) => "maintenance",
            Self::Waiting(_) => "waiting",
            Self::Blocked(_) => "blocked",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Active => "",
            Self::Maintenance(msg) | Self::Waiting(msg) | Self::Blocked(msg) => msg,
        }
    }

    /// Whether the hook should be reported as failed.
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Waiting(_) | Self::Blocked(_))
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str(self.name()),
            _ => write!(f, "{}: {}", self.name(), self.message()),
        }
    }
}
