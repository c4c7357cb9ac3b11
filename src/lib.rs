#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # podspec
//!
//! Charm entry point: loads a charm directory, dispatches lifecycle hooks
//! to the reconciler and reports the resulting unit status.

pub use podspec_core;
pub use podspec_reconciler;

pub mod cli;
pub mod dispatch;
pub mod runtime;
pub mod status;

pub use dispatch::{DispatchOutcome, Dispatcher, EventHandler, RECONCILE_EVENTS, ReconcileHandler};
pub use runtime::{DEFAULT_RESOURCE, Runtime, RuntimeOptions};
pub use status::UnitStatus;
