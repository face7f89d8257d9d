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

//! Whole-file content digest computed before transfer.

use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::Error;
use crate::s3::utils::b64encode;

const READ_BUF_SIZE: usize = 64 * 1024;

/// Metadata key under which the digest is attached to a session.
pub const DIGEST_METADATA_KEY: &str = "b64_digest";

/// MD5 digest of the entire source content, in the encodings the remote
/// metadata field and logs want.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChecksumMetadata {
    pub b64_digest: String,
    pub hex_digest: String,
}

/// Streams the file once through MD5 without holding it in memory.
/// An unreadable source is fatal to the whole upload attempt.
pub async fn compute_file_md5(path: &Path) -> Result<ChecksumMetadata, Error> {
    let mut file = File::open(path).await.map_err(Error::Checksum)?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];

    loop {
        let n = file.read(&mut buf).await.map_err(Error::Checksum)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }

    let digest = context.compute();
    Ok(ChecksumMetadata {
        b64_digest: b64encode(digest.as_slice()),
        hex_digest: format!("{:x}", digest),
    })
}
