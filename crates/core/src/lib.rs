//! Core types for podspec: the configuration snapshot and the charm
//! directory it is built from.

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod charm;
pub mod config;
pub mod error;

pub use charm::{CharmDir, CharmMetadata, CharmOptions, OptionSpec, OptionType, Override};
pub use config::{ConfigValue, Configuration};
pub use error::{Error, Result};
