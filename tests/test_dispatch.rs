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

mod common;

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use smartbackup::engine::chunk::PartSpec;
use smartbackup::engine::{dispatch, part};
use smartbackup::error::Error;

use common::FakeStore;

fn write_source(dir: &TempDir, size: usize) -> PathBuf {
    let path = dir.path().join("source.bin");
    std::fs::write(&path, vec![0x5au8; size]).unwrap();
    path
}

fn specs(count: u16, length: u64) -> Vec<PartSpec> {
    (1..=count)
        .map(|number| PartSpec {
            number,
            offset: (number as u64 - 1) * length,
            length,
        })
        .collect()
}

#[tokio::test]
async fn worker_pool_width_is_respected() {
    common::init_logger();
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, 8 * 1024);
    let store = FakeStore::with_part_delay(Duration::from_millis(25));
    let session_id = store.seed_session("key", &[]);

    let results = dispatch::run(
        &store,
        "key",
        &session_id,
        &source,
        specs(8, 1024),
        3,
        1,
        false,
        0,
        None,
    )
    .await;

    assert_eq!(results.len(), 8);
    assert!(results.iter().all(|r| r.is_ok()));
    assert!(store.max_in_flight() <= 3, "pool width exceeded");
    assert!(store.max_in_flight() >= 2, "no parallelism observed");
}

#[tokio::test]
async fn failed_part_does_not_stop_the_others() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, 4 * 1024);
    let store = FakeStore::new();
    let session_id = store.seed_session("key", &[]);
    store.fail_part(3, u32::MAX);

    let results = dispatch::run(
        &store,
        "key",
        &session_id,
        &source,
        specs(4, 1024),
        2,
        2,
        false,
        0,
        None,
    )
    .await;

    let failed: Vec<&Error> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(failed.len(), 1);
    assert!(matches!(failed[0], Error::PartRetryExhausted(3, 2, _)));
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
}

#[tokio::test]
async fn timeout_abandons_pending_parts() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, 2 * 1024);
    let store = FakeStore::with_part_delay(Duration::from_secs(5));
    let session_id = store.seed_session("key", &[]);

    let results = dispatch::run(
        &store,
        "key",
        &session_id,
        &source,
        specs(2, 1024),
        2,
        1,
        false,
        0,
        Some(Duration::from_millis(20)),
    )
    .await;

    assert!(results.is_empty());
    assert_eq!(store.open_sessions("key").len(), 1);
}

#[tokio::test]
async fn stale_session_fails_without_touching_the_source() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, 1024);
    let store = FakeStore::new();
    store.seed_session("key", &[]);

    let spec = PartSpec {
        number: 1,
        offset: 0,
        length: 1024,
    };
    let res = part::upload_with_retry(&store, "key", "gone-session", &source, spec, 2, false).await;
    assert!(matches!(res, Err(Error::PartRetryExhausted(1, 2, _))));
    assert_eq!(store.calls().upload_part, 0);
}

#[tokio::test]
async fn short_source_is_reported() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, 512);
    let store = FakeStore::new();
    let session_id = store.seed_session("key", &[]);

    let spec = PartSpec {
        number: 1,
        offset: 0,
        length: 1024,
    };
    let res = part::upload_with_retry(&store, "key", &session_id, &source, spec, 1, false).await;
    assert!(matches!(res, Err(Error::PartRetryExhausted(1, 1, _))));
}
