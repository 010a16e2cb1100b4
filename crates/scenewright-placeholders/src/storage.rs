//! Object storage backends.

use crate::{ObjectStorage, PlaceholderError, PlaceholderResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Keeps objects in process memory. URLs use the `memory://` scheme unless a
/// base URL is given.
#[derive(Debug)]
pub struct MemoryObjectStorage {
    base_url: String,
    objects: DashMap<String, StoredObject>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Default for MemoryObjectStorage {
    fn default() -> Self {
        Self::new("memory://placeholders")
    }
}

impl MemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|o| o.value().clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> PlaceholderResult<String> {
        check_key(key)?;
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("{}/{}", self.base_url, key))
    }
}

/// Writes objects under a root directory.
#[derive(Debug, Clone)]
pub struct FsObjectStorage {
    root: PathBuf,
    base_url: Option<String>,
}

impl FsObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    /// Serve URLs from `base_url` instead of `file://` paths.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStorage for FsObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> PlaceholderResult<String> {
        check_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), content_type, "stored object");

        match &self.base_url {
            Some(base) => Ok(format!("{}/{}", base, key)),
            None => {
                let absolute = tokio::fs::canonicalize(&path).await?;
                Ok(format!("file://{}", absolute.display()))
            }
        }
    }
}

/// Keys are relative paths without `..`.
fn check_key(key: &str) -> PlaceholderResult<()> {
    let path = Path::new(key);
    let valid = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(PlaceholderError::Storage(format!("invalid object key '{key}'")))
    }
}
