//! # podspec - charm entry point
//!
//! ## Sequence
//!
//! 1. **Tracing** - `RUST_LOG` filter, `info` by default
//! 2. **Charm** - load `metadata.yaml`, `config.yaml` and `--set` overrides
//! 3. **Cancellation** - Ctrl+C or `--timeout-secs` cancel the trigger
//! 4. **Command** - run a hook through the dispatch table, or render only
//!
//! ## Exit status
//!
//! A hook that ends `waiting` or `blocked` exits non-zero. Ignored hooks,
//! `active` and `maintenance` exit zero.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use podspec::cli::{Cli, Commands};
use podspec::podspec_reconciler::{LifecycleEvent, TriggerContext};
use podspec::{DispatchOutcome, Runtime, UnitStatus};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let runtime = Runtime::load(&cli.runtime_options())
        .with_context(|| format!("Failed to load charm at {}", cli.charm_dir.display()))?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    if let Some(secs) = cli.timeout_secs {
        cancel_after(cancel.clone(), Duration::from_secs(secs));
    }

    match cli.command {
        Commands::Hook { event } => run_hook(&runtime, TriggerContext::with_cancel(event, cancel)).await,
        Commands::Render => {
            // render runs outside any hook; start is the closest trigger
            let trigger = TriggerContext::with_cancel(LifecycleEvent::Start, cancel);
            let spec = runtime.plan(&trigger).await?;
            print!("{}", spec.document());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_hook(runtime: &Runtime, trigger: TriggerContext) -> Result<ExitCode> {
    info!(event = %trigger.event, target_name = runtime.target(), "Running hook");
    info!(status = %UnitStatus::reconciling(), "Unit status");

    let outcome = runtime.dispatcher().dispatch(&trigger).await;
    let Some(status) = outcome.status() else {
        info!(event = %trigger.event, "Hook ignored");
        return Ok(ExitCode::SUCCESS);
    };

    match &status {
        UnitStatus::Active => info!(
            %status,
            output = %runtime.output_path().display(),
            "Hook finished"
        ),
        UnitStatus::Maintenance(_) => warn!(%status, "Hook interrupted"),
        UnitStatus::Waiting(_) | UnitStatus::Blocked(_) => error!(%status, "Hook failed"),
    }
    println!("{status}");

    if let DispatchOutcome::Handled(result) = &outcome {
        if let Some(spec) = result.spec() {
            info!(fingerprint = %spec.fingerprint(), "Spec fingerprint");
        }
    }

    Ok(if status.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Cancel `token` on Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received Ctrl+C, canceling");
                token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {e}"),
        }
    });
}

/// Cancel `token` once `after` has elapsed.
fn cancel_after(token: CancellationToken, after: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            () = tokio::time::sleep(after) => {
                warn!(timeout_secs = after.as_secs(), "Timeout reached, canceling");
                token.cancel();
            }
        }
    });
}
