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

//! Bounded-concurrency fan-out of part uploads.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;
use log::{info, warn};

use crate::error::Error;

use super::chunk::PartSpec;
use super::part;
use super::store::RemoteStore;

/// Runs the part uploader over the residual work set with at most
/// `concurrency` transfers in flight. Every submitted part is driven to a
/// terminal outcome before this returns; one part exhausting its retries
/// does not stop the others. The completeness decision is not made here —
/// the verifier re-queries remote state afterwards.
///
/// `timeout` bounds the whole dispatch-and-join step. On expiry the session
/// is simply left pending for a later resume, which is safe under the
/// resumable finalize policy.
///
/// Progress is reported every `progress_every` finished parts; zero
/// silences it.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    store: &dyn RemoteStore,
    key: &str,
    session_id: &str,
    source: &Path,
    parts: Vec<PartSpec>,
    concurrency: usize,
    retries: u32,
    verbose: bool,
    progress_every: u32,
    timeout: Option<Duration>,
) -> Vec<Result<u16, Error>> {
    let workers = concurrency.max(1);
    let total = parts.len();
    let mut finished = 0usize;
    let join = stream::iter(parts)
        .map(|spec| async move {
            part::upload_with_retry(store, key, session_id, source, spec, retries, verbose)
                .await
                .map(|record| record.number)
        })
        .buffer_unordered(workers)
        .inspect(move |outcome: &Result<u16, Error>| {
            finished += 1;
            if outcome.is_ok() && progress_every > 0 && finished % progress_every as usize == 0 {
                info!("transferred {}/{} parts of '{}'", finished, total, key);
            }
        })
        .collect::<Vec<_>>();

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, join).await {
            Ok(results) => results,
            Err(_) => {
                warn!(
                    "dispatch of '{}' timed out after {:?}; session left pending",
                    key, limit
                );
                Vec::new()
            }
        },
        None => join.await,
    }
}
