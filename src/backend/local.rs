// SmartBackup library for resumable backups to S3 compatible storage
// Copyright 2024 the SmartBackup authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Backend storing artifacts in a local directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::info;

use crate::error::Error;

use super::{StorageBackend, object_key};

/// Stores artifacts as plain files inside a container directory. Mostly
/// useful for testing a backup pipeline without remote storage.
pub struct LocalBackend {
    name: String,
    container: PathBuf,
    server_name: String,
}

impl LocalBackend {
    pub fn new(name: &str, container: &Path, server_name: &str) -> LocalBackend {
        LocalBackend {
            name: name.to_string(),
            container: container.to_path_buf(),
            server_name: server_name.to_string(),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, source: &Path) -> Result<String, Error> {
        let key = object_key(&self.server_name, source)?;
        tokio::fs::create_dir_all(&self.container).await?;
        tokio::fs::copy(source, self.container.join(&key)).await?;
        info!("stored \"{}\" in {}", key, self.container.display());
        Ok(key)
    }

    async fn download(&self, key: &str, target: &Path) -> Result<(), Error> {
        tokio::fs::copy(self.container.join(key), target).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, Error> {
        Ok(tokio::fs::try_exists(self.container.join(key)).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        tokio::fs::remove_file(self.container.join(key)).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let prefix = format!("{}_", self.server_name);
        let mut keys = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.container).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) {
                keys.push(name);
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend(dir: &TempDir) -> LocalBackend {
        LocalBackend::new("local", &dir.path().join("container"), "srv1")
    }

    #[tokio::test]
    async fn upload_download_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("db.sql.gz");
        std::fs::write(&source, b"dump").unwrap();

        let backend = backend(&dir);
        let key = backend.upload(&source).await.unwrap();
        assert_eq!(key, "srv1_db.sql.gz");
        assert!(backend.exists(&key).await.unwrap());

        let target = dir.path().join("restored.sql.gz");
        backend.download(&key, &target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"dump");
    }

    #[tokio::test]
    async fn list_only_shows_own_server_keys() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);

        let source = dir.path().join("etc.tar.gz");
        std::fs::write(&source, b"tar").unwrap();
        backend.upload(&source).await.unwrap();

        // A foreign server's artifact in the same container.
        std::fs::write(
            dir.path().join("container").join("srv2_etc.tar.gz"),
            b"other",
        )
        .unwrap();

        assert_eq!(backend.list().await.unwrap(), vec!["srv1_etc.tar.gz"]);
    }

    #[tokio::test]
    async fn delete_removes_artifact() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);

        let source = dir.path().join("db.sql.gz");
        std::fs::write(&source, b"dump").unwrap();
        let key = backend.upload(&source).await.unwrap();

        backend.delete(&key).await.unwrap();
        assert!(!backend.exists(&key).await.unwrap());
    }
}
