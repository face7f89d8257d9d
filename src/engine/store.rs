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

//! Capability contract the upload engine requires from a remote object store.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Error;
use crate::s3::utils::Multimap;

/// A multipart upload session open on the remote side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionHandle {
    pub key: String,
    pub session_id: String,
}

/// The remote side's durable record of one uploaded part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartRecord {
    pub number: u16,
    pub etag: String,
}

/// Multipart upload primitives of the remote object store.
///
/// The remote listing is authoritative: the engine re-queries sessions and
/// parts instead of caching them across workers, so implementations must be
/// safe for concurrent use.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Starts a new multipart upload session and returns its identifier.
    async fn create_session(
        &self,
        key: &str,
        headers: &Multimap,
        metadata: &Multimap,
    ) -> Result<String, Error>;

    /// Lists sessions already open against given key, oldest first.
    async fn list_sessions(&self, key: &str) -> Result<Vec<SessionHandle>, Error>;

    /// Transfers one part and returns the remote record of it.
    async fn upload_part(
        &self,
        key: &str,
        session_id: &str,
        part_number: u16,
        data: Bytes,
    ) -> Result<PartRecord, Error>;

    /// Lists the parts the remote side has durably stored for given session.
    async fn list_parts(&self, key: &str, session_id: &str) -> Result<Vec<PartRecord>, Error>;

    /// Assembles all uploaded parts into the final object.
    async fn complete_session(
        &self,
        key: &str,
        session_id: &str,
        parts: &[PartRecord],
    ) -> Result<(), Error>;

    /// Destroys a session and its uploaded parts.
    async fn abort_session(&self, key: &str, session_id: &str) -> Result<(), Error>;

    /// Uploads an object in a single call, bypassing multipart.
    async fn put_object(
        &self,
        key: &str,
        headers: &Multimap,
        metadata: &Multimap,
        data: Bytes,
    ) -> Result<(), Error>;

    /// Checks whether an object exists under given key.
    async fn object_exists(&self, key: &str) -> Result<bool, Error>;

    /// Applies an access policy to a stored object.
    async fn set_object_policy(&self, key: &str, policy: &str) -> Result<(), Error>;
}
