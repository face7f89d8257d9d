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

//! Session discovery and creation for resumable uploads.

use std::collections::BTreeSet;

use log::info;

use crate::error::Error;
use crate::s3::utils::Multimap;

use super::store::RemoteStore;

/// A resolved multipart upload session. `uploaded` reflects the remote part
/// listing at resolution time; workers never mutate it — the authoritative
/// state is re-queried from the store when it matters.
#[derive(Clone, Debug)]
pub struct UploadSession {
    pub id: String,
    pub key: String,
    pub part_count: u16,
    pub uploaded: BTreeSet<u16>,
}

impl UploadSession {
    /// Part numbers not yet stored remotely, in ascending order.
    pub fn pending_parts(&self) -> Vec<u16> {
        (1..=self.part_count)
            .filter(|n| !self.uploaded.contains(n))
            .collect()
    }
}

/// Discovers a resumable session for given key or creates a fresh one.
///
/// Exactly one remote session-create call happens on the fresh path and none
/// on resume. Resume picks the most recently discovered session (last in the
/// listing). Any store failure here is fatal and leaves no partial state.
pub async fn resolve(
    store: &dyn RemoteStore,
    key: &str,
    part_count: u16,
    headers: &Multimap,
    metadata: &Multimap,
) -> Result<UploadSession, Error> {
    let sessions = store
        .list_sessions(key)
        .await
        .map_err(|e| Error::Session(Box::new(e)))?;

    if let Some(handle) = sessions.last() {
        info!("recovering upload \"{}\"", key);
        let uploaded: BTreeSet<u16> = store
            .list_parts(key, &handle.session_id)
            .await
            .map_err(|e| Error::Session(Box::new(e)))?
            .into_iter()
            .map(|p| p.number)
            .collect();

        return Ok(UploadSession {
            id: handle.session_id.clone(),
            key: key.to_string(),
            part_count,
            uploaded,
        });
    }

    let id = store
        .create_session(key, headers, metadata)
        .await
        .map_err(|e| Error::Session(Box::new(e)))?;

    Ok(UploadSession {
        id,
        key: key.to_string(),
        part_count,
        uploaded: BTreeSet::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_parts_excludes_uploaded() {
        let session = UploadSession {
            id: String::from("sid"),
            key: String::from("k"),
            part_count: 4,
            uploaded: BTreeSet::from([1, 3]),
        };
        assert_eq!(session.pending_parts(), vec![2, 4]);
    }

    #[test]
    fn pending_parts_of_fresh_session_is_full_range() {
        let session = UploadSession {
            id: String::from("sid"),
            key: String::from("k"),
            part_count: 3,
            uploaded: BTreeSet::new(),
        };
        assert_eq!(session.pending_parts(), vec![1, 2, 3]);
    }

    #[test]
    fn pending_parts_of_complete_session_is_empty() {
        let session = UploadSession {
            id: String::from("sid"),
            key: String::from("k"),
            part_count: 2,
            uploaded: BTreeSet::from([1, 2]),
        };
        assert!(session.pending_parts().is_empty());
    }
}
