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

//! S3 API client and its supporting pieces.

pub mod client;
pub mod creds;
pub mod http;
pub mod response;
pub mod signer;
pub mod utils;

pub use client::{BucketClient, Client};
pub use creds::{Credentials, Provider, StaticProvider};
pub use http::BaseUrl;
