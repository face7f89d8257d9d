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

//! Storage backends and their registry.
//!
//! A backend stores backup artifacts under server-scoped keys so that
//! multiple machines can share one container without colliding.

pub mod local;
pub mod s3;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;

pub use local::LocalBackend;
pub use s3::S3Backend;

/// Derives the storage key for a source file: the server name joined to
/// the file name with an underscore.
pub fn object_key(server_name: &str, source: &Path) -> Result<String, Error> {
    let file_name = source
        .file_name()
        .and_then(|v| v.to_str())
        .ok_or_else(|| {
            Error::InvalidObjectName(format!("source '{}' has no usable file name", source.display()))
        })?;
    Ok(format!("{}_{}", server_name, file_name))
}

/// Returns the name of the machine running the backup, used to scope keys.
pub fn server_name() -> Result<String, Error> {
    Ok(hostname::get()?.to_string_lossy().to_string())
}

/// A destination for backup artifacts.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name this backend is registered under.
    fn name(&self) -> &str;

    /// Stores the file and returns the key it was stored under.
    async fn upload(&self, source: &Path) -> Result<String, Error>;

    /// Fetches a stored artifact into `target`.
    async fn download(&self, key: &str, target: &Path) -> Result<(), Error>;

    /// Checks whether an artifact is stored under given key.
    async fn exists(&self, key: &str) -> Result<bool, Error>;

    /// Removes a stored artifact.
    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Lists the keys this server has stored.
    async fn list(&self) -> Result<Vec<String>, Error>;
}

/// Maps backend names to instances. Built once at startup and passed
/// where needed; there is no process-wide instance.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn StorageBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend under its name, replacing any previous one.
    pub fn register(&mut self, backend: Arc<dyn StorageBackend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    /// Looks a backend up by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn StorageBackend>, Error> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NoBackend(name.to_string()))
    }

    /// Names of all registered backends.
    pub fn names(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn object_key_joins_server_and_file_name() {
        let key = object_key("srv1", Path::new("/var/backups/db.sql.gz")).unwrap();
        assert_eq!(key, "srv1_db.sql.gz");
    }

    #[test]
    fn object_key_rejects_pathless_source() {
        assert!(object_key("srv1", Path::new("/")).is_err());
    }

    #[test]
    fn registry_resolves_registered_backends() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new("local", dir.path(), "srv1");

        let mut registry = BackendRegistry::new();
        registry.register(Arc::new(backend));

        assert!(registry.resolve("local").is_ok());
        assert!(matches!(
            registry.resolve("absent"),
            Err(Error::NoBackend(name)) if name == "absent"
        ));
    }
}
