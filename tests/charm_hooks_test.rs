//! Integration tests for running hooks against a charm directory.
//!
//! These tests verify that:
//! - Reconciling hooks write the rendered spec and report `active`
//! - Other hooks are ignored
//! - Broken resources and templates map to `waiting` / `blocked`
//! - Config defaults and `--set` overrides reach the rendered environment

#![forbid(clippy::unwrap_used)]
#![forbid(clippy::expect_used)]
#![forbid(clippy::panic)]

use std::path::Path;

use podspec::podspec_core::Override;
use podspec::podspec_reconciler::{LifecycleEvent, TriggerContext};
use podspec::{DispatchOutcome, RECONCILE_EVENTS, Runtime, RuntimeOptions, UnitStatus};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const METADATA: &str = "name: bitcoind
resources:
  bitcoind:
    type: oci-image
";

const CONFIG: &str = "options:
  btc-rpcuser:
    type: string
    default: bitcoin
  btc-rpcport:
    type: int
    default: 8332
  log-level:
    type: string
    default: info
";

const TEMPLATE: &str = "name: {{ name | tojson }}
image: {{ registry_path | tojson }}
env:
{%- for key, value in environment | dictsort %}
  {{ key }}: {{ value | tojson }}
{%- endfor %}
";

const RESOURCE: &str = "registrypath: reg.example/img\nusername: u\npassword: p\n";

/// Lay out a charm under a temp dir; `None` leaves the file out.
fn charm(resource: Option<&str>, template: Option<&str>) -> Result<TempDir, std::io::Error> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("charm");
    std::fs::create_dir_all(root.join("templates"))?;
    std::fs::create_dir_all(root.join("resources"))?;
    std::fs::write(root.join("metadata.yaml"), METADATA)?;
    std::fs::write(root.join("config.yaml"), CONFIG)?;
    if let Some(template) = template {
        std::fs::write(root.join("templates/spec_template.yaml"), template)?;
    }
    if let Some(resource) = resource {
        std::fs::write(root.join("resources/bitcoind.yaml"), resource)?;
    }
    Ok(dir)
}

fn options(dir: &Path) -> RuntimeOptions {
    RuntimeOptions::new(dir.join("charm"), dir.join("out"))
}

async fn run(runtime: &Runtime, event: LifecycleEvent) -> DispatchOutcome {
    runtime
        .dispatcher()
        .dispatch(&TriggerContext::new(event))
        .await
}

/// Test that every reconciling hook writes the spec and reports active.
///
/// # GIVEN
/// A complete charm directory
///
/// # WHEN
/// start, config-changed and upgrade-charm run
///
/// # THEN
/// Each reports `active` and `<out>/bitcoind.yaml` holds the rendered spec
#[tokio::test]
async fn test_reconciling_hooks_apply_spec() -> TestResult {
    // GIVEN
    let dir = charm(Some(RESOURCE), Some(TEMPLATE))?;
    let runtime = Runtime::load(&options(dir.path()))?;

    // WHEN / THEN
    for event in RECONCILE_EVENTS {
        let outcome = run(&runtime, event).await;
        assert_eq!(outcome.status(), Some(UnitStatus::Active), "{event}");
    }

    let written = std::fs::read_to_string(runtime.output_path())?;
    let doc: serde_yaml::Value = serde_yaml::from_str(&written)?;
    assert_eq!(doc["name"].as_str(), Some("bitcoind"));
    assert_eq!(doc["image"].as_str(), Some("reg.example/img"));
    assert_eq!(doc["env"]["BTC_RPCUSER"].as_str(), Some("bitcoin"));
    assert_eq!(doc["env"]["BTC_RPCPORT"].as_i64(), Some(8332));
    assert!(doc["env"].get("LOG_LEVEL").is_none());
    Ok(())
}

/// Test that hooks outside the dispatch table do nothing.
///
/// # GIVEN
/// A complete charm directory
///
/// # WHEN
/// install, update-status, stop and remove run
///
/// # THEN
/// They are ignored and no spec is written
#[tokio::test]
async fn test_other_hooks_are_ignored() -> TestResult {
    let dir = charm(Some(RESOURCE), Some(TEMPLATE))?;
    let runtime = Runtime::load(&options(dir.path()))?;

    for event in [
        LifecycleEvent::Install,
        LifecycleEvent::UpdateStatus,
        LifecycleEvent::Stop,
        LifecycleEvent::Remove,
    ] {
        assert_eq!(run(&runtime, event).await, DispatchOutcome::Ignored);
    }
    assert!(!runtime.output_path().exists());
    Ok(())
}

/// Test that overrides reach the rendered environment.
///
/// # GIVEN
/// `--set btc-rpcuser=alice --set btc-rpcport=18332`
///
/// # WHEN
/// The spec is planned
///
/// # THEN
/// The overrides replace the defaults and nothing is written
#[tokio::test]
async fn test_overrides_replace_defaults() -> TestResult {
    let dir = charm(Some(RESOURCE), Some(TEMPLATE))?;
    let opts = options(dir.path())
        .with_override("btc-rpcuser=alice".parse::<Override>()?)
        .with_override("btc-rpcport=18332".parse::<Override>()?);
    let runtime = Runtime::load(&opts)?;

    let spec = runtime
        .plan(&TriggerContext::new(LifecycleEvent::Start))
        .await?;

    assert!(spec.document().contains("BTC_RPCUSER: \"alice\""));
    assert!(spec.document().contains("BTC_RPCPORT: 18332"));
    assert!(!runtime.output_path().exists());
    Ok(())
}

/// Test that an unknown override key is rejected at load time.
///
/// # GIVEN
/// `--set btc-nonexistent=1`
///
/// # WHEN
/// The runtime is loaded
///
/// # THEN
/// Loading fails and names the key
#[test]
fn test_unknown_override_is_rejected() -> TestResult {
    let dir = charm(Some(RESOURCE), Some(TEMPLATE))?;
    let opts = options(dir.path()).with_override("btc-nonexistent=1".parse::<Override>()?);

    let err = Runtime::load(&opts).err().ok_or("expected load to fail")?;

    assert!(format!("{err:#}").contains("btc-nonexistent"));
    Ok(())
}

/// Test that a missing resource leaves the unit waiting.
///
/// # GIVEN
/// A charm without `resources/bitcoind.yaml`
///
/// # WHEN
/// start runs
///
/// # THEN
/// Status is `waiting` with a fetching detail
#[tokio::test]
async fn test_missing_resource_is_waiting() -> TestResult {
    let dir = charm(None, Some(TEMPLATE))?;
    let runtime = Runtime::load(&options(dir.path()))?;

    let status = run(&runtime, LifecycleEvent::Start)
        .await
        .status()
        .ok_or("start should be handled")?;

    assert!(
        matches!(&status, UnitStatus::Waiting(detail) if detail.starts_with("fetching: ")),
        "{status}"
    );
    assert!(status.is_error());
    Ok(())
}

/// Test that an incomplete resource blocks the unit.
///
/// # GIVEN
/// A resource without a password
///
/// # WHEN
/// start runs
///
/// # THEN
/// Status is `blocked` naming the missing field
#[tokio::test]
async fn test_incomplete_resource_is_blocked() -> TestResult {
    let dir = charm(
        Some("registrypath: reg.example/img\nusername: u\n"),
        Some(TEMPLATE),
    )?;
    let runtime = Runtime::load(&options(dir.path()))?;

    let status = run(&runtime, LifecycleEvent::ConfigChanged)
        .await
        .status()
        .ok_or("config-changed should be handled")?;

    assert_eq!(status.name(), "blocked");
    assert!(status.message().contains("password"), "{status}");
    Ok(())
}

/// Test that a template referencing an unknown variable blocks the unit.
///
/// # GIVEN
/// A template using `{{ replicas }}`
///
/// # WHEN
/// start runs
///
/// # THEN
/// Status is `blocked` from the rendering stage
#[tokio::test]
async fn test_bad_template_is_blocked() -> TestResult {
    let dir = charm(Some(RESOURCE), Some("replicas: {{ replicas }}\n"))?;
    let runtime = Runtime::load(&options(dir.path()))?;

    let status = run(&runtime, LifecycleEvent::Start)
        .await
        .status()
        .ok_or("start should be handled")?;

    assert!(
        matches!(&status, UnitStatus::Blocked(detail) if detail.starts_with("rendering: ")),
        "{status}"
    );
    Ok(())
}

/// Test that a canceled hook reports maintenance.
///
/// # GIVEN
/// A trigger canceled before dispatch
///
/// # WHEN
/// start runs
///
/// # THEN
/// Status is `maintenance` and not an error
#[tokio::test]
async fn test_canceled_hook_is_maintenance() -> TestResult {
    let dir = charm(Some(RESOURCE), Some(TEMPLATE))?;
    let runtime = Runtime::load(&options(dir.path()))?;
    let trigger = TriggerContext::new(LifecycleEvent::Start);
    trigger.cancel.cancel();

    let status = runtime
        .dispatcher()
        .dispatch(&trigger)
        .await
        .status()
        .ok_or("start should be handled")?;

    assert_eq!(status.name(), "maintenance");
    assert!(!status.is_error());
    assert!(!runtime.output_path().exists());
    Ok(())
}

/// Test that the bundled demo charm renders.
///
/// # GIVEN
/// The `charm/` directory shipped with the crate
///
/// # WHEN
/// The spec is planned with defaults
///
/// # THEN
/// The document is a pod spec carrying the image and the btc environment
#[tokio::test]
async fn test_bundled_charm_renders() -> TestResult {
    let out = tempfile::tempdir()?;
    let charm_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("charm");
    let runtime = Runtime::load(&RuntimeOptions::new(charm_dir, out.path()))?;

    let spec = runtime
        .plan(&TriggerContext::new(LifecycleEvent::Start))
        .await?;
    let doc: serde_yaml::Value = serde_yaml::from_str(spec.document())?;

    let container = &doc["containers"][0];
    assert_eq!(container["name"].as_str(), Some("bitcoind"));
    assert_eq!(
        container["imageDetails"]["imagePath"].as_str(),
        Some("registry.example.com/bitcoin/bitcoind:24.0")
    );
    assert_eq!(container["envConfig"]["BTC_RPCPORT"].as_i64(), Some(8332));
    assert_eq!(container["ports"][0]["containerPort"].as_i64(), Some(8332));
    assert!(container["envConfig"].get("LOG_LEVEL").is_none());
    Ok(())
}
