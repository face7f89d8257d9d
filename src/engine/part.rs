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

//! Upload of a single part with bounded retry.

use std::io::SeekFrom;
use std::path::Path;

use bytes::Bytes;
use log::{debug, error, info};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::Error;

use super::chunk::PartSpec;
use super::store::{PartRecord, RemoteStore};

/// Reads exactly `[offset, offset + length)` from the source. The file is
/// opened, read and released per invocation so workers never hold handles
/// across part transfers.
async fn read_range(path: &Path, offset: u64, length: u64) -> Result<Bytes, Error> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;

    let mut buf = Vec::with_capacity(length as usize);
    file.take(length).read_to_end(&mut buf).await?;
    if (buf.len() as u64) < length {
        return Err(Error::InsufficientData(length, buf.len() as u64));
    }

    Ok(buf.into())
}

async fn try_upload(
    store: &dyn RemoteStore,
    key: &str,
    session_id: &str,
    source: &Path,
    part: PartSpec,
) -> Result<PartRecord, Error> {
    // The session handle is rediscovered on every attempt instead of trusted
    // from memory; a handle that vanished from the listing is stale.
    let sessions = store.list_sessions(key).await?;
    if !sessions.iter().any(|s| s.session_id == session_id) {
        return Err(Error::InvalidUploadId(format!(
            "session {} no longer listed for '{}'",
            session_id, key
        )));
    }

    let data = read_range(source, part.offset, part.length).await?;
    store.upload_part(key, session_id, part.number, data).await
}

/// Uploads one part, retrying immediately on failure up to `retries`
/// attempts. Exhaustion is logged and reported to the dispatcher; other
/// in-flight parts are unaffected.
pub async fn upload_with_retry(
    store: &dyn RemoteStore,
    key: &str,
    session_id: &str,
    source: &Path,
    part: PartSpec,
    retries: u32,
    verbose: bool,
) -> Result<PartRecord, Error> {
    let attempts = retries.max(1);
    let mut attempts_left = attempts;

    loop {
        if verbose {
            info!(
                "start uploading part #{} ({} bytes at offset {})",
                part.number, part.length, part.offset
            );
        }

        match try_upload(store, key, session_id, source, part).await {
            Ok(record) => {
                if verbose {
                    info!("uploaded part #{}", part.number);
                }
                return Ok(record);
            }
            Err(e) => {
                attempts_left -= 1;
                if attempts_left == 0 {
                    error!("failed uploading part #{}: {}", part.number, e);
                    return Err(Error::PartRetryExhausted(
                        part.number,
                        attempts,
                        e.to_string(),
                    ));
                }
                debug!(
                    "part #{} attempt failed ({}), {} attempts left",
                    part.number, e, attempts_left
                );
            }
        }
    }
}
