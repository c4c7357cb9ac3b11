//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use podspec_core::Override;
use podspec_reconciler::{DEFAULT_ENV_PREFIX, DEFAULT_TEMPLATE, LifecycleEvent};

use crate::runtime::{DEFAULT_RESOURCE, RuntimeOptions};

/// podspec - charm entry point
#[derive(Parser, Debug)]
#[command(name = "podspec")]
#[command(version)]
#[command(about = "Render a workload pod spec from charm config and an image resource")]
#[command(
    long_about = "podspec reads a charm directory, reconciles the workload spec on lifecycle hooks and writes the result to an output directory."
)]
pub struct Cli {
    /// Charm directory (metadata.yaml, config.yaml, templates/, resources/)
    #[arg(long, env = "CHARM_DIR", default_value = ".")]
    pub charm_dir: PathBuf,

    /// Directory the applied spec is written to
    #[arg(long, env = "PODSPEC_OUTPUT_DIR", default_value = "out")]
    pub output_dir: PathBuf,

    /// Config override, repeatable
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<Override>,

    /// Cancel the reconcile after this many seconds
    #[arg(long, env = "PODSPEC_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Resource holding the image metadata
    #[arg(long, default_value = DEFAULT_RESOURCE)]
    pub resource: String,

    /// Template rendered into the spec
    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    pub template: String,

    /// Config key prefix feeding the workload environment
    #[arg(long, default_value = DEFAULT_ENV_PREFIX)]
    pub prefix: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a lifecycle hook (start, config-changed, upgrade-charm, ...)
    Hook {
        /// Hook name
        #[arg(env = "JUJU_HOOK_NAME")]
        event: LifecycleEvent,
    },

    /// Print the desired spec without applying it
    Render,
}

impl Cli {
    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            charm_dir: self.charm_dir.clone(),
            output_dir: self.output_dir.clone(),
            overrides: self.overrides.clone(),
            resource: self.resource.clone(),
            template: self.template.clone(),
            env_prefix: self.prefix.clone(),
        }
    }
}
