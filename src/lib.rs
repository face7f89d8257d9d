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

//! SmartBackup — resumable parallel uploads of backup artifacts to S3
//! compatible object storage.
//!
//! The heart of the crate is [`engine::UploadEngine`]: it splits a source
//! file into parts sized by a square-root scaling law, uploads the parts
//! over a bounded worker pool with per-part retry, and finalizes the
//! object only after the remote side confirms every part. An interrupted
//! run leaves the multipart session open; the next run resumes it and
//! transfers only the missing parts.
//!
//! ```no_run
//! use std::path::Path;
//! use std::str::FromStr;
//! use std::sync::Arc;
//!
//! use smartbackup::config::UploadConfig;
//! use smartbackup::engine::UploadEngine;
//! use smartbackup::s3::{BaseUrl, BucketClient, Client, StaticProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), smartbackup::error::Error> {
//!     let base_url = BaseUrl::from_str("https://play.min.io")?;
//!     let provider = StaticProvider::new("minioadmin", "minioadmin", None);
//!     let client = Client::new(base_url, Some(Arc::new(provider)))?;
//!     let bucket = BucketClient::new(client, "backups")?;
//!
//!     let engine = UploadEngine::new(Arc::new(bucket), UploadConfig::default());
//!     engine
//!         .upload("srv1_db.sql.gz", Path::new("/var/backups/db.sql.gz"))
//!         .await
//! }
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod s3;
