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

//! Error definitions for upload engine, backends and the S3 client

use crate::s3::utils::get_default_text;
use bytes::{Buf, Bytes};
use thiserror::Error;
use xmltree::Element;

/// Error response returned by the remote store for a failed S3 operation.
#[derive(Clone, Debug, Default)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub resource: String,
    pub request_id: String,
    pub host_id: String,
    pub bucket_name: String,
    pub object_name: String,
}

impl ErrorResponse {
    pub fn parse(body: &mut Bytes) -> Result<ErrorResponse, Error> {
        let root = Element::parse(body.reader())?;

        Ok(ErrorResponse {
            code: get_default_text(&root, "Code"),
            message: get_default_text(&root, "Message"),
            resource: get_default_text(&root, "Resource"),
            request_id: get_default_text(&root, "RequestId"),
            host_id: get_default_text(&root, "HostId"),
            bucket_name: get_default_text(&root, "BucketName"),
            object_name: get_default_text(&root, "Key"),
        })
    }
}

/// Error definitions
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    TimeParseError(#[from] chrono::ParseError),
    #[error("{0}")]
    InvalidUrl(#[from] http::uri::InvalidUri),
    #[error("{0}")]
    IOError(#[from] std::io::Error),
    #[error("{0}")]
    XmlParseError(#[from] xmltree::ParseError),
    #[error("{0}")]
    HttpError(#[from] reqwest::Error),
    #[error("{0}")]
    StrError(#[from] reqwest::header::ToStrError),
    #[error("{0}")]
    IntError(#[from] std::num::ParseIntError),
    #[error("{0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
    #[error("{0}")]
    XmlError(String),
    #[error("{0}")]
    InvalidBucketName(String),
    #[error("{0}")]
    InvalidBaseUrl(String),
    #[error("{0}")]
    UrlBuildError(String),
    #[error(
        "s3 operation failed; code: {}, message: {}, resource: {}, request_id: {}, host_id: {}, bucket_name: {}, object_name: {}",
        .0.code, .0.message, .0.resource, .0.request_id, .0.host_id, .0.bucket_name, .0.object_name
    )]
    S3Error(ErrorResponse),
    #[error("invalid response received; status code: {0}; content-type: {1}")]
    InvalidResponse(u16, String),
    #[error("server failed with HTTP status code {0}")]
    ServerError(u16),
    #[error("{0}")]
    InvalidObjectName(String),
    #[error("{0}")]
    InvalidUploadId(String),
    #[error("{0}")]
    InvalidPartNumber(String),
    #[error("object size {0} is not supported; maximum allowed 5TiB")]
    InvalidObjectSize(u64),
    #[error("object size {0} and part size {1} make more than {2} parts for upload")]
    InvalidPartCount(u64, u64, u16),
    #[error("not enough data in the source; expected: {0}, got: {1} bytes")]
    InsufficientData(u64, u64),
    #[error("unable to read source for checksum: {0}")]
    Checksum(#[source] std::io::Error),
    #[error("session resolution failed: {0}")]
    Session(#[source] Box<Error>),
    #[error("part #{0} failed after {1} attempts: {2}")]
    PartRetryExhausted(u16, u32, String),
    #[error("upload of '{key}' incomplete; {uploaded} of {expected} parts stored, re-run to resume")]
    UploadIncomplete {
        key: String,
        uploaded: u16,
        expected: u16,
    },
    #[error("finalize failed: {0}")]
    Finalize(#[source] Box<Error>),
    #[error("no backend registered under name '{0}'")]
    NoBackend(String),
}
