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

//! Backend storing artifacts in an S3 compatible bucket via the resumable
//! upload engine.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::UploadConfig;
use crate::engine::UploadEngine;
use crate::error::Error;
use crate::s3::BucketClient;

use super::{StorageBackend, object_key};

/// Uploads artifacts through the multipart engine so interrupted backups
/// resume instead of restarting.
pub struct S3Backend {
    name: String,
    server_name: String,
    key_prefix: String,
    bucket: BucketClient,
    engine: UploadEngine,
}

impl S3Backend {
    /// Returns a backend storing into given bucket. `server_name` defaults
    /// to the machine's hostname when not given; `key_prefix` places all
    /// keys under a common path inside the bucket.
    pub fn new(
        name: &str,
        bucket: BucketClient,
        config: UploadConfig,
        server_name: Option<&str>,
        key_prefix: Option<&str>,
    ) -> Result<S3Backend, Error> {
        let server_name = match server_name {
            Some(v) => v.to_string(),
            None => super::server_name()?,
        };
        let mut key_prefix = key_prefix.unwrap_or_default().to_string();
        if !key_prefix.is_empty() && !key_prefix.ends_with('/') {
            key_prefix.push('/');
        }
        let engine = UploadEngine::new(Arc::new(bucket.clone()), config);

        Ok(S3Backend {
            name: name.to_string(),
            server_name,
            key_prefix,
            bucket,
            engine,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, source: &Path) -> Result<String, Error> {
        let key = format!(
            "{}{}",
            self.key_prefix,
            object_key(&self.server_name, source)?
        );
        self.engine.upload(&key, source).await?;
        Ok(key)
    }

    async fn download(&self, key: &str, target: &Path) -> Result<(), Error> {
        let data = self
            .bucket
            .client()
            .get_object(self.bucket.bucket_name(), key)
            .await?;
        tokio::fs::write(target, data).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, Error> {
        self.engine.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.bucket
            .client()
            .remove_object(self.bucket.bucket_name(), key)
            .await
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let prefix = format!("{}{}_", self.key_prefix, self.server_name);
        self.bucket
            .client()
            .list_objects(self.bucket.bucket_name(), &prefix)
            .await
    }
}
