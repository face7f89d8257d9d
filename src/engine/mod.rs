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

//! Resilient parallel multipart upload engine.
//!
//! The engine plans part boundaries from the source size, resumes any
//! session already open for the key, fans the residual parts out over a
//! bounded worker pool and finalizes only after re-querying the remote
//! part listing. A failed or interrupted run leaves the session open so
//! the next run picks up where it stopped.

pub mod checksum;
pub mod chunk;
pub mod dispatch;
pub mod part;
pub mod session;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info};

use crate::config::UploadConfig;
use crate::error::Error;
use crate::s3::utils::{Multimap, guess_content_type, merge};

use chunk::{ChunkPlan, PartSpec};
use store::{PartRecord, RemoteStore};

/// Drives resumable uploads against a [`RemoteStore`].
pub struct UploadEngine {
    store: Arc<dyn RemoteStore>,
    config: UploadConfig,
}

impl UploadEngine {
    pub fn new(store: Arc<dyn RemoteStore>, config: UploadConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Headers sent with session creation and whole-object puts.
    fn request_headers(&self, key: &str) -> Multimap {
        let mut headers = Multimap::new();
        if self.config.guess_content_type && !self.config.headers.contains_key("Content-Type") {
            headers.insert(
                String::from("Content-Type"),
                guess_content_type(key).to_string(),
            );
        }
        if self.config.reduced_durability {
            headers.insert(
                String::from("x-amz-storage-class"),
                String::from("REDUCED_REDUNDANCY"),
            );
        }
        merge(&mut headers, &self.config.headers);
        headers
    }

    /// Configured metadata plus the content digest of the source.
    fn request_metadata(&self, b64_digest: &str) -> Multimap {
        let mut metadata = Multimap::new();
        for (k, v) in &self.config.metadata {
            metadata.insert(k.clone(), v.clone());
        }
        metadata.insert(
            String::from(checksum::DIGEST_METADATA_KEY),
            b64_digest.to_string(),
        );
        metadata
    }

    /// Uploads the file at `source` under `key`, resuming any session a
    /// previous run left open.
    ///
    /// On success the object is assembled and its access policy applied.
    /// When parts are still missing after the dispatch — retries exhausted,
    /// dispatch timeout, or a stale part listing — the session is left open
    /// and [`Error::UploadIncomplete`] reports the residual count; running
    /// again transfers only what is missing.
    pub async fn upload(&self, key: &str, source: &Path) -> Result<(), Error> {
        let size = tokio::fs::metadata(source).await?.len();
        let cs = checksum::compute_file_md5(source).await?;
        debug!("source '{}' is {} bytes, md5 {}", key, size, cs.hex_digest);

        let headers = self.request_headers(key);
        let metadata = self.request_metadata(&cs.b64_digest);

        if size == 0 {
            info!("uploading empty object \"{}\" without multipart", key);
            let data = tokio::fs::read(source).await?;
            self.store
                .put_object(key, &headers, &metadata, Bytes::from(data))
                .await?;
            self.store
                .set_object_policy(key, &self.config.policy)
                .await
                .map_err(|e| Error::Finalize(Box::new(e)))?;
            return Ok(());
        }

        let plan = ChunkPlan::for_size(size)?;
        let session =
            session::resolve(&*self.store, key, plan.part_count, &headers, &metadata).await?;

        let pending: Vec<PartSpec> = plan
            .parts(size)
            .filter(|p| !session.uploaded.contains(&p.number))
            .collect();
        info!(
            "uploading \"{}\": {} of {} parts pending, {} workers",
            key,
            pending.len(),
            plan.part_count,
            self.config.concurrency
        );

        dispatch::run(
            &*self.store,
            key,
            &session.id,
            source,
            pending,
            self.config.concurrency,
            self.config.retries,
            self.config.debug,
            self.config.progress_granularity,
            self.config.timeout,
        )
        .await;

        self.verify_and_finalize(key, &session.id, plan.part_count)
            .await
    }

    /// Finalizes the session if and only if the remote listing shows every
    /// planned part. The listing is re-queried here rather than trusted
    /// from the dispatch outcomes; the remote side is authoritative.
    async fn verify_and_finalize(
        &self,
        key: &str,
        session_id: &str,
        expected: u16,
    ) -> Result<(), Error> {
        let mut parts: Vec<PartRecord> = self.store.list_parts(key, session_id).await?;
        if parts.len() != expected as usize {
            return Err(Error::UploadIncomplete {
                key: key.to_string(),
                uploaded: parts.len() as u16,
                expected,
            });
        }

        parts.sort_by_key(|p| p.number);
        self.store
            .complete_session(key, session_id, &parts)
            .await
            .map_err(|e| Error::Finalize(Box::new(e)))?;
        self.store
            .set_object_policy(key, &self.config.policy)
            .await
            .map_err(|e| Error::Finalize(Box::new(e)))?;

        info!("upload of \"{}\" complete ({} parts)", key, expected);
        Ok(())
    }

    /// Checks whether an object is already stored under `key`.
    pub async fn exists(&self, key: &str) -> Result<bool, Error> {
        self.store.object_exists(key).await
    }
}
