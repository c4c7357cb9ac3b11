//! Reconciliation engine that derives a workload spec and hands it to a sink.
//!
//! On every lifecycle trigger the reconciler recomputes the desired state
//! from scratch:
//!
//! 1. **Fetch** the image resource from a [`ResourceStore`]
//! 2. **Parse** it into [`ImageMetadata`] with the [`MetadataParser`]
//! 3. **Render** the spec template with the [`SpecRenderer`]
//! 4. **Apply** the result through a [`StateSink`]
//!
//! A failing stage short-circuits the rest and yields
//! [`ReconcileResult::Failed`] carrying the error kind, the stage and the
//! cause. Nothing is retried and nothing is logged directly; structured
//! events go to an injected [`ReconcileObserver`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use podspec_core::Configuration;
//! use podspec_reconciler::{
//!     InMemoryResourceStore, InMemoryStateSink, LifecycleEvent, Reconciler,
//!     TemplateStore, TriggerContext,
//! };
//!
//! let reconciler = Reconciler::builder()
//!     .with_resources(Arc::new(InMemoryResourceStore::new().with_resource(
//!         "bitcoind",
//!         "registrypath: reg.example/img\nusername: u\npassword: p\n",
//!     )))
//!     .with_sink(Arc::new(InMemoryStateSink::new()))
//!     .with_templates(TemplateStore::from_dir("charm/templates"))
//!     .build()?;
//!
//! let config = Configuration::new().with("btc-rpcuser", "alice");
//! let result = reconciler
//!     .reconcile(&TriggerContext::new(LifecycleEvent::Start), &config)
//!     .await;
//! ```

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod lock;
pub mod metadata;
pub mod observe;
pub mod reconciler;
pub mod render;
pub mod sink;
pub mod store;
pub mod types;

// Re-export main types
pub use error::{Error, ErrorClass, ErrorKind, Result};
pub use lock::TargetLocks;
pub use metadata::MetadataParser;
pub use observe::{
    NoopObserver, ReconcileEvent, ReconcileObserver, RecordingObserver, TracingObserver,
};
pub use reconciler::{BuildError, Reconciler, ReconcilerBuilder, ReconcilerConfig};
pub use render::{
    DEFAULT_ENV_PREFIX, DEFAULT_TEMPLATE, EnvConfig, SpecRenderer, TemplateStore, env_key,
};
pub use sink::{FileStateSink, InMemoryStateSink, StateSink};
pub use store::{FilesystemResourceStore, InMemoryResourceStore, ResourceStore};
pub use types::{
    DesiredSpec, Failure, ImageMetadata, LifecycleEvent, ReconcileResult, ReconcileState,
    TriggerContext, UnknownEvent,
};
