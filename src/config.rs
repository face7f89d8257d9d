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

//! Upload configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::s3::utils::Multimap;

/// Options recognized by the upload engine.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// Access policy applied to the object after finalize.
    pub policy: String,
    /// How often progress is reported, in parts.
    pub progress_granularity: u32,
    /// Verbose per-part logging.
    pub debug: bool,
    /// Extra headers sent with session creation and whole-object puts.
    pub headers: Multimap,
    /// Worker pool width for part uploads.
    pub concurrency: usize,
    /// Ask the store for reduced durability storage.
    pub reduced_durability: bool,
    /// Derive the content type from the key name extension.
    pub guess_content_type: bool,
    /// Extra metadata merged with the checksum metadata.
    pub metadata: HashMap<String, String>,
    /// Retry budget per part.
    pub retries: u32,
    /// Upper bound on the whole dispatch-and-join step. On expiry the
    /// session is left pending for a later resume.
    pub timeout: Option<Duration>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            policy: String::from("private"),
            progress_granularity: 10,
            debug: true,
            headers: Multimap::new(),
            concurrency: 4,
            reduced_durability: false,
            guess_content_type: true,
            metadata: HashMap::new(),
            retries: 10,
            timeout: None,
        }
    }
}

impl UploadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy(mut self, policy: &str) -> Self {
        self.policy = policy.to_string();
        self
    }

    pub fn progress_granularity(mut self, granularity: u32) -> Self {
        self.progress_granularity = granularity;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn headers(mut self, headers: Multimap) -> Self {
        self.headers = headers;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn reduced_durability(mut self, reduced: bool) -> Self {
        self.reduced_durability = reduced;
        self
    }

    pub fn guess_content_type(mut self, guess: bool) -> Self {
        self.guess_content_type = guess;
        self
    }

    pub fn metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
