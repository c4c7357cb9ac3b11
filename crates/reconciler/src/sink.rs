//! State sink trait and implementations.
//!
//! A sink accepts the desired spec for a target with upsert semantics:
//! applying the same spec twice leaves the target in the same state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::types::DesiredSpec;

/// Accepts desired state for a target.
#[async_trait]
pub trait StateSink: Send + Sync {
    /// Upsert `spec` for `spec.target()`.
    async fn apply(&self, spec: &DesiredSpec) -> Result<()>;
}

/// In-memory sink keeping the last applied spec per target.
#[derive(Debug, Default)]
pub struct InMemoryStateSink {
    applied: RwLock<HashMap<String, DesiredSpec>>,
    apply_count: AtomicUsize,
}

impl InMemoryStateSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last spec applied for `target`.
    pub async fn get(&self, target: &str) -> Option<DesiredSpec> {
        self.applied.read().await.get(target).cloned()
    }

    /// Number of distinct targets holding a spec.
    pub async fn len(&self) -> usize {
        self.applied.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.applied.read().await.is_empty()
    }

    /// Total number of apply calls, including repeats.
    pub fn apply_count(&self) -> usize {
        self.apply_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateSink for InMemoryStateSink {
    async fn apply(&self, spec: &DesiredSpec) -> Result<()> {
        self.apply_count.fetch_add(1, Ordering::SeqCst);
        self.applied
            .write()
            .await
            .insert(spec.target().to_string(), spec.clone());
        Ok(())
    }
}

/// Sink writing each target's spec to `<dir>/<target>.yaml`.
///
/// The file is replaced through a rename so readers never see a partial
/// document.
#[derive(Debug, Clone)]
pub struct FileStateSink {
    dir: PathBuf,
}

impl FileStateSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a target's spec is written to.
    pub fn path_for(&self, target: &str) -> PathBuf {
        self.dir.join(format!("{target}.yaml"))
    }
}

#[async_trait]
impl StateSink for FileStateSink {
    async fn apply(&self, spec: &DesiredSpec) -> Result<()> {
        let target = spec.target();
        if target.is_empty() || target.contains(['/', '\\']) || target.starts_with('.') {
            return Err(Error::apply_failed(target, "target is not a valid file name"));
        }

        let failed = |what: &str, e: std::io::Error| Error::apply_failed(target, format!("{what}: {e}"));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| failed("create output directory", e))?;

        let path = self.path_for(target);
        let staging = self.dir.join(format!(".{target}.yaml.tmp"));
        tokio::fs::write(&staging, spec.document())
            .await
            .map_err(|e| failed("write spec", e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| failed("replace spec", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_in_memory_upserts() -> Result<()> {
        let sink = InMemoryStateSink::new();
        sink.apply(&DesiredSpec::new("bitcoind", "a: 1\n")).await?;
        sink.apply(&DesiredSpec::new("bitcoind", "a: 2\n")).await?;

        assert_eq!(sink.len().await, 1);
        assert_eq!(sink.apply_count(), 2);
        assert_eq!(
            sink.get("bitcoind").await.map(|s| s.document().to_string()),
            Some("a: 2\n".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_file_sink_writes_and_replaces() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let sink = FileStateSink::new(dir.path().join("out"));

        sink.apply(&DesiredSpec::new("bitcoind", "a: 1\n")).await?;
        sink.apply(&DesiredSpec::new("bitcoind", "a: 2\n")).await?;

        let written = std::fs::read_to_string(sink.path_for("bitcoind"))?;
        assert_eq!(written, "a: 2\n");
        assert!(!dir.path().join("out/.bitcoind.yaml.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_file_sink_rejects_path_targets() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let sink = FileStateSink::new(dir.path());

        let err = sink.apply(&DesiredSpec::new("../escape", "a: 1\n")).await.err();
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::ApplyFailed));
        Ok(())
    }
}
