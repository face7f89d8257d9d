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

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use smartbackup::engine::store::{PartRecord, RemoteStore, SessionHandle};
use smartbackup::error::{Error, ErrorResponse};
use smartbackup::s3::utils::Multimap;

/// Routes engine logs through the test harness when `RUST_LOG` is set.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Counters of remote calls made against a [`FakeStore`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CallCounts {
    pub create_session: u32,
    pub upload_part: u32,
    pub complete_session: u32,
    pub put_object: u32,
    pub set_policy: u32,
}

#[derive(Default)]
struct State {
    next_session: u32,
    // key -> session ids, in creation order
    sessions: Vec<SessionHandle>,
    // session id -> parts stored so far
    parts: HashMap<String, BTreeMap<u16, PartRecord>>,
    // finished objects: key -> byte size
    objects: HashMap<String, u64>,
    policies: HashMap<String, String>,
    // part number -> remaining injected failures
    fail_parts: HashMap<u16, u32>,
    // headers and metadata of the most recent session create or object put
    last_headers: Multimap,
    last_metadata: Multimap,
    calls: CallCounts,
}

/// In-memory store with failure injection and concurrency tracking.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
    part_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn s3_error(code: &str, message: &str) -> Error {
    Error::S3Error(ErrorResponse {
        code: code.to_string(),
        message: message.to_string(),
        ..Default::default()
    })
}

impl FakeStore {
    pub fn new() -> FakeStore {
        FakeStore::default()
    }

    /// Delays each part upload, giving concurrent transfers time to pile up.
    pub fn with_part_delay(delay: Duration) -> FakeStore {
        FakeStore {
            part_delay: Some(delay),
            ..Default::default()
        }
    }

    /// Makes the next `failures` uploads of given part number fail.
    pub fn fail_part(&self, part_number: u16, failures: u32) {
        let mut state = self.state.lock().unwrap();
        state.fail_parts.insert(part_number, failures);
    }

    /// Opens a session directly, as if a previous run created it.
    pub fn seed_session(&self, key: &str, uploaded_parts: &[u16]) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_session += 1;
        let session_id = format!("session-{}", state.next_session);

        state.sessions.push(SessionHandle {
            key: key.to_string(),
            session_id: session_id.clone(),
        });
        let parts = state.parts.entry(session_id.clone()).or_default();
        for &number in uploaded_parts {
            parts.insert(
                number,
                PartRecord {
                    number,
                    etag: format!("etag-{}", number),
                },
            );
        }
        session_id
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls
    }

    pub fn open_sessions(&self, key: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .sessions
            .iter()
            .filter(|s| s.key == key)
            .map(|s| s.session_id.clone())
            .collect()
    }

    pub fn stored_object_size(&self, key: &str) -> Option<u64> {
        self.state.lock().unwrap().objects.get(key).copied()
    }

    pub fn policy(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().policies.get(key).cloned()
    }

    /// Highest number of part uploads observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_headers(&self) -> Multimap {
        self.state.lock().unwrap().last_headers.clone()
    }

    pub fn last_metadata(&self) -> Multimap {
        self.state.lock().unwrap().last_metadata.clone()
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn create_session(
        &self,
        key: &str,
        headers: &Multimap,
        metadata: &Multimap,
    ) -> Result<String, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.create_session += 1;
        state.last_headers = headers.clone();
        state.last_metadata = metadata.clone();
        state.next_session += 1;
        let session_id = format!("session-{}", state.next_session);
        state.sessions.push(SessionHandle {
            key: key.to_string(),
            session_id: session_id.clone(),
        });
        state.parts.insert(session_id.clone(), BTreeMap::new());
        Ok(session_id)
    }

    async fn list_sessions(&self, key: &str) -> Result<Vec<SessionHandle>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.key == key)
            .cloned()
            .collect())
    }

    async fn upload_part(
        &self,
        _key: &str,
        session_id: &str,
        part_number: u16,
        data: Bytes,
    ) -> Result<PartRecord, Error> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.part_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        state.calls.upload_part += 1;

        if let Some(remaining) = state.fail_parts.get_mut(&part_number) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::ServerError(500));
            }
        }

        let record = PartRecord {
            number: part_number,
            etag: format!("etag-{}-{}", part_number, data.len()),
        };
        state
            .parts
            .get_mut(session_id)
            .ok_or_else(|| s3_error("NoSuchUpload", "unknown session"))?
            .insert(part_number, record.clone());
        Ok(record)
    }

    async fn list_parts(&self, _key: &str, session_id: &str) -> Result<Vec<PartRecord>, Error> {
        let state = self.state.lock().unwrap();
        let parts = state
            .parts
            .get(session_id)
            .ok_or_else(|| s3_error("NoSuchUpload", "unknown session"))?;
        Ok(parts.values().cloned().collect())
    }

    async fn complete_session(
        &self,
        key: &str,
        session_id: &str,
        parts: &[PartRecord],
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.complete_session += 1;

        let stored = state
            .parts
            .remove(session_id)
            .ok_or_else(|| s3_error("NoSuchUpload", "unknown session"))?;
        if stored.len() != parts.len() {
            return Err(s3_error("InvalidPart", "part list mismatch"));
        }

        state.sessions.retain(|s| s.session_id != session_id);
        state.objects.insert(key.to_string(), parts.len() as u64);
        Ok(())
    }

    async fn abort_session(&self, _key: &str, session_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.parts.remove(session_id);
        state.sessions.retain(|s| s.session_id != session_id);
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        headers: &Multimap,
        metadata: &Multimap,
        data: Bytes,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.put_object += 1;
        state.last_headers = headers.clone();
        state.last_metadata = metadata.clone();
        state.objects.insert(key.to_string(), data.len() as u64);
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> Result<bool, Error> {
        let state = self.state.lock().unwrap();
        Ok(state.objects.contains_key(key))
    }

    async fn set_object_policy(&self, key: &str, policy: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.set_policy += 1;
        if !state.objects.contains_key(key) {
            return Err(s3_error("NoSuchKey", "object not stored"));
        }
        state.policies.insert(key.to_string(), policy.to_string());
        Ok(())
    }
}
