//! Byte storage behind albums and images.
//!
//! Services talk to a [`BlobStore`] handed to them at construction time.
//! Keys are relative, `/`-separated paths such as `albums/{album}/{file}`.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Component, Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_KEY_LEN: usize = 4096;

/// Storage capability used by the gallery services.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous content.
    async fn write(&self, key: &str, bytes: Bytes) -> io::Result<()>;

    /// Read the full content stored under `key`.
    async fn read(&self, key: &str) -> io::Result<Bytes>;

    /// Remove a single entry. Missing entries are reported as `NotFound`.
    async fn delete(&self, key: &str) -> io::Result<()>;

    /// Remove every entry below `prefix`, recursively.
    async fn delete_tree(&self, prefix: &str) -> io::Result<()>;
}

/// Blob store backed by a directory on local disk.
#[derive(Clone, Debug)]
pub struct DiskBlobStore {
    root: PathBuf,
}

impl DiskBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto the filesystem, refusing anything that could escape the root.
    fn resolve(&self, key: &str) -> io::Result<PathBuf> {
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(invalid_key(key));
        }
        if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
            return Err(invalid_key(key));
        }
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(invalid_key(key));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    /// Writes to a temporary sibling, syncs, then renames into place.
    async fn write(&self, key: &str, bytes: Bytes) -> io::Result<()> {
        let path = self.resolve(key)?;
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("blob path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        let written: io::Result<()> = async {
            file.write_all(&bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        debug!("wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn read(&self, key: &str) -> io::Result<Bytes> {
        let path = self.resolve(key)?;
        Ok(Bytes::from(fs::read(&path).await?))
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        let path = self.resolve(key)?;
        fs::remove_file(&path).await?;
        debug!("removed file {}", path.display());
        Ok(())
    }

    async fn delete_tree(&self, prefix: &str) -> io::Result<()> {
        let path = self.resolve(prefix)?;
        fs::remove_dir_all(&path).await?;
        debug!("removed directory tree {}", path.display());
        Ok(())
    }
}

fn invalid_key(key: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidInput, format!("invalid storage key `{}`", key))
}

/// In-memory blob store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryBlobStore {
    entries: tokio::sync::RwLock<std::collections::BTreeMap<String, Bytes>>,
}

#[cfg(test)]
impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(&self, key: &str, bytes: Bytes) -> io::Result<()> {
        self.entries.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn read(&self, key: &str) -> io::Result<Bytes> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| io::Error::from(ErrorKind::NotFound))
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        self.entries
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| io::Error::from(ErrorKind::NotFound))
    }

    async fn delete_tree(&self, prefix: &str) -> io::Result<()> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&dir));
        if entries.len() == before {
            return Err(io::Error::from(ErrorKind::NotFound));
        }
        Ok(())
    }
}
