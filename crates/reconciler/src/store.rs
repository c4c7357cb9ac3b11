//! Resource store trait and implementations.

use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Resolves a resource name to its raw content.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch the bytes registered under `name`.
    ///
    /// Fails with `NotFound` for an empty or unknown name and with
    /// `Unreadable` when the resource exists but is empty or cannot be read.
    async fn fetch(&self, name: &str) -> Result<Vec<u8>>;
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::not_found("<empty>"));
    }
    Ok(())
}

fn check_content(name: &str, content: Vec<u8>) -> Result<Vec<u8>> {
    if content.is_empty() {
        Err(Error::unreadable(name, "resource is empty"))
    } else {
        Ok(content)
    }
}

/// In-memory resource store.
#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    resources: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryResourceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.resources
            .get_mut()
            .insert(name.into(), content.into());
        self
    }

    /// Register or replace a resource.
    pub async fn insert(&self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.resources
            .write()
            .await
            .insert(name.into(), content.into());
    }

    /// Remove a resource.
    pub async fn remove(&self, name: &str) {
        self.resources.write().await.remove(name);
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        check_name(name)?;
        let content = self
            .resources
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(name))?;
        check_content(name, content)
    }
}

/// Resource store backed by a directory.
///
/// `name` resolves to `<root>/<name>`, falling back to `<root>/<name>.yaml`.
#[derive(Debug, Clone)]
pub struct FilesystemResourceStore {
    root: PathBuf,
}

impl FilesystemResourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        // names are flat identifiers, never paths
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return None;
        }
        [self.root.join(name), self.root.join(format!("{name}.yaml"))]
            .into_iter()
            .find(|path| path.is_file())
    }
}

#[async_trait]
impl ResourceStore for FilesystemResourceStore {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        check_name(name)?;
        let path = self.resolve(name).ok_or_else(|| Error::not_found(name))?;

        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| read_error(name, &path, &e))?;
        check_content(name, content)
    }
}

/// A file that vanished between resolve and read is `NotFound`; any other
/// read failure is `Unreadable`.
fn read_error(name: &str, path: &Path, e: &std::io::Error) -> Error {
    match e.kind() {
        IoErrorKind::NotFound => Error::not_found(name),
        _ => Error::unreadable(name, format!("{}: {e}", path.display())),
    }
}
