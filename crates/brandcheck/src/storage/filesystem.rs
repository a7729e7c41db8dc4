use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use log::debug;

use super::{encode_storage_path, AssetStore};
use crate::error::StorageError;

/// Objects stored as plain files under a root directory, served publicly
/// from `public_base_url`.
pub struct FilesystemStore {
    root: PathBuf,
    public_base_url: String,
}

impl FilesystemStore {
    pub fn new<P: AsRef<Path>>(root: P, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a storage path onto the root, rejecting absolute paths and `..`.
    fn resolve(&self, storage_path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(storage_path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        let mut has_file = false;

        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    has_file = true;
                }
                Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(storage_path.to_string())),
            }
        }

        if !has_file {
            return Err(StorageError::InvalidPath(storage_path.to_string()));
        }
        Ok(resolved)
    }

    /// Writes `content` at `storage_path`, creating parent directories.
    /// Refuses to overwrite an existing object.
    pub fn put(&self, storage_path: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.resolve(storage_path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::WriteObject {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StorageError::WriteObject {
                path: path.clone(),
                source: e,
            })?;
        file.write_all(content)
            .map_err(|e| StorageError::WriteObject {
                path: path.clone(),
                source: e,
            })?;

        debug!("Stored {} bytes at {}", content.len(), path.display());
        Ok(path)
    }
}

#[async_trait]
impl AssetStore for FilesystemStore {
    async fn download(&self, storage_path: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(storage_path)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_path.to_string()))
            }
            Err(e) => Err(StorageError::ReadObject { path, source: e }),
        }
    }

    fn public_url(&self, storage_path: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url,
            encode_storage_path(storage_path)
        )
    }
}
