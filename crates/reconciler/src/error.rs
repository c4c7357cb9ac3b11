//! Error types for the reconciler crate.
//!
//! Every stage reports failures through [`Error`]; [`Error::kind`] maps a
//! failure onto the flat [`ErrorKind`] taxonomy the caller acts on.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a reconcile failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NotFound,
    Unreadable,
    MalformedDocument,
    IncompleteMetadata,
    ConfigCollision,
    TemplateNotFound,
    TemplateRenderError,
    ApplyFailed,
    Canceled,
}

/// How the caller should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorClass {
    /// Likely transient; the next trigger may succeed unchanged.
    Recoverable,
    /// Needs an operator to change config, resource or template.
    Configuration,
    /// The trigger was canceled before anything was applied.
    Canceled,
}

impl ErrorKind {
    /// The class this kind belongs to.
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::NotFound | Self::Unreadable | Self::ApplyFailed => ErrorClass::Recoverable,
            Self::MalformedDocument
            | Self::IncompleteMetadata
            | Self::ConfigCollision
            | Self::TemplateNotFound
            | Self::TemplateRenderError => ErrorClass::Configuration,
            Self::Canceled => ErrorClass::Canceled,
        }
    }

    /// Whether retrying on the next trigger without changes may succeed.
    pub const fn is_recoverable(self) -> bool {
        matches!(self.class(), ErrorClass::Recoverable)
    }

    /// Stable name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Unreadable => "Unreadable",
            Self::MalformedDocument => "MalformedDocument",
            Self::IncompleteMetadata => "IncompleteMetadata",
            Self::ConfigCollision => "ConfigCollision",
            Self::TemplateNotFound => "TemplateNotFound",
            Self::TemplateRenderError => "TemplateRenderError",
            Self::ApplyFailed => "ApplyFailed",
            Self::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciler error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("resource '{name}' not found")]
    NotFound { name: String },

    #[error("resource '{name}' unreadable: {reason}")]
    Unreadable { name: String, reason: String },

    #[error("malformed metadata document: {reason}")]
    MalformedDocument { reason: String },

    #[error("incomplete metadata: field '{field}' {reason}")]
    IncompleteMetadata { field: String, reason: String },

    #[error("config keys '{first}' and '{second}' both map to environment key '{env_key}'")]
    ConfigCollision {
        env_key: String,
        first: String,
        second: String,
    },

    #[error("template '{name}' not found")]
    TemplateNotFound { name: String },

    #[error("template '{name}' failed to render: {reason}")]
    TemplateRender { name: String, reason: String },

    #[error("apply to '{target}' failed: {reason}")]
    ApplyFailed { target: String, reason: String },

    #[error("reconcile canceled")]
    Canceled,
}

impl Error {
    /// The taxonomy kind of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unreadable { .. } => ErrorKind::Unreadable,
            Self::MalformedDocument { .. } => ErrorKind::MalformedDocument,
            Self::IncompleteMetadata { .. } => ErrorKind::IncompleteMetadata,
            Self::ConfigCollision { .. } => ErrorKind::ConfigCollision,
            Self::TemplateNotFound { .. } => ErrorKind::TemplateNotFound,
            Self::TemplateRender { .. } => ErrorKind::TemplateRenderError,
            Self::ApplyFailed { .. } => ErrorKind::ApplyFailed,
            Self::Canceled => ErrorKind::Canceled,
        }
    }

    /// Create a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create an unreadable resource error.
    pub fn unreadable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreadable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed document error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            reason: reason.into(),
        }
    }

    /// Create an incomplete metadata error.
    pub fn incomplete(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IncompleteMetadata {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a config collision error.
    pub fn collision(
        env_key: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::ConfigCollision {
            env_key: env_key.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    /// Create a template not found error.
    pub fn template_not_found(name: impl Into<String>) -> Self {
        Self::TemplateNotFound { name: name.into() }
    }

    /// Create a template render error.
    pub fn template_render(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TemplateRender {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an apply failed error.
    pub fn apply_failed(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ApplyFailed {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("bitcoind");
        assert!(err.to_string().contains("bitcoind"));
    }

    #[test]
    fn test_collision_names_both_keys() {
        let err = Error::collision("BTC_RPCUSER", "btc-rpcuser", "btc_rpcuser");
        let msg = err.to_string();
        assert!(msg.contains("btc-rpcuser"));
        assert!(msg.contains("btc_rpcuser"));
        assert!(msg.contains("BTC_RPCUSER"));
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(ErrorKind::NotFound.is_recoverable());
        assert!(ErrorKind::Unreadable.is_recoverable());
        assert!(ErrorKind::ApplyFailed.is_recoverable());
        assert!(!ErrorKind::Canceled.is_recoverable());
    }

    #[test]
    fn test_configuration_kinds() {
        for kind in [
            ErrorKind::MalformedDocument,
            ErrorKind::IncompleteMetadata,
            ErrorKind::ConfigCollision,
            ErrorKind::TemplateNotFound,
            ErrorKind::TemplateRenderError,
        ] {
            assert_eq!(kind.class(), ErrorClass::Configuration, "{kind}");
        }
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::template_render("t", "x").kind(),
            ErrorKind::TemplateRenderError
        );
        assert_eq!(Error::Canceled.kind(), ErrorKind::Canceled);
    }
}
