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

//! Typed views over S3 XML response bodies.

use bytes::{Buf, Bytes};
use xmltree::Element;

use crate::error::Error;
use crate::s3::utils::{UtcTime, get_default_text, get_option_text, get_text};

/// Response of CreateMultipartUpload API.
#[derive(Clone, Debug)]
pub struct CreateMultipartUploadResponse {
    pub bucket_name: String,
    pub object_name: String,
    pub upload_id: String,
}

impl CreateMultipartUploadResponse {
    pub fn parse(body: &mut Bytes) -> Result<Self, Error> {
        let root = Element::parse(body.reader())?;
        Ok(Self {
            bucket_name: get_default_text(&root, "Bucket"),
            object_name: get_default_text(&root, "Key"),
            upload_id: get_text(&root, "UploadId")?,
        })
    }
}

/// One in-progress multipart upload from a ListMultipartUploads page.
#[derive(Clone, Debug)]
pub struct MultipartUpload {
    pub key: String,
    pub upload_id: String,
    pub initiated: Option<UtcTime>,
}

/// One page of ListMultipartUploads API results.
#[derive(Clone, Debug)]
pub struct ListMultipartUploadsResponse {
    pub uploads: Vec<MultipartUpload>,
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_upload_id_marker: Option<String>,
}

impl ListMultipartUploadsResponse {
    pub fn parse(body: &mut Bytes) -> Result<Self, Error> {
        let root = Element::parse(body.reader())?;

        let mut uploads = Vec::new();
        for child in &root.children {
            if let Some(element) = child.as_element() {
                if element.name == "Upload" {
                    uploads.push(MultipartUpload {
                        key: get_text(element, "Key")?,
                        upload_id: get_text(element, "UploadId")?,
                        initiated: match get_option_text(element, "Initiated") {
                            Some(v) => Some(v.parse::<UtcTime>()?),
                            None => None,
                        },
                    });
                }
            }
        }

        Ok(Self {
            uploads,
            is_truncated: get_default_text(&root, "IsTruncated").eq_ignore_ascii_case("true"),
            next_key_marker: get_option_text(&root, "NextKeyMarker"),
            next_upload_id_marker: get_option_text(&root, "NextUploadIdMarker"),
        })
    }
}

/// One uploaded part from a ListParts page.
#[derive(Clone, Debug)]
pub struct UploadedPart {
    pub number: u16,
    pub etag: String,
    pub size: Option<u64>,
}

/// One page of ListParts API results.
#[derive(Clone, Debug)]
pub struct ListPartsResponse {
    pub parts: Vec<UploadedPart>,
    pub is_truncated: bool,
    pub next_part_number_marker: Option<u16>,
}

impl ListPartsResponse {
    pub fn parse(body: &mut Bytes) -> Result<Self, Error> {
        let root = Element::parse(body.reader())?;

        let mut parts = Vec::new();
        for child in &root.children {
            if let Some(element) = child.as_element() {
                if element.name == "Part" {
                    parts.push(UploadedPart {
                        number: get_text(element, "PartNumber")?.parse::<u16>()?,
                        etag: get_text(element, "ETag")?.trim_matches('"').to_string(),
                        size: match get_option_text(element, "Size") {
                            Some(v) => Some(v.parse::<u64>()?),
                            None => None,
                        },
                    });
                }
            }
        }

        let next_part_number_marker = match get_option_text(&root, "NextPartNumberMarker") {
            Some(v) => Some(v.parse::<u16>()?),
            None => None,
        };

        Ok(Self {
            parts,
            is_truncated: get_default_text(&root, "IsTruncated").eq_ignore_ascii_case("true"),
            next_part_number_marker,
        })
    }
}

/// Response of CompleteMultipartUpload API.
#[derive(Clone, Debug)]
pub struct CompleteMultipartUploadResponse {
    pub bucket_name: String,
    pub object_name: String,
    pub etag: String,
}

impl CompleteMultipartUploadResponse {
    pub fn parse(body: &mut Bytes) -> Result<Self, Error> {
        let root = Element::parse(body.reader())?;
        Ok(Self {
            bucket_name: get_default_text(&root, "Bucket"),
            object_name: get_default_text(&root, "Key"),
            etag: get_default_text(&root, "ETag").trim_matches('"').to_string(),
        })
    }
}

/// One page of ListObjectsV2 API results.
#[derive(Clone, Debug)]
pub struct ListObjectsResponse {
    pub keys: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

impl ListObjectsResponse {
    pub fn parse(body: &mut Bytes) -> Result<Self, Error> {
        let root = Element::parse(body.reader())?;

        let mut keys = Vec::new();
        for child in &root.children {
            if let Some(element) = child.as_element() {
                if element.name == "Contents" {
                    keys.push(get_text(element, "Key")?);
                }
            }
        }

        Ok(Self {
            keys,
            is_truncated: get_default_text(&root, "IsTruncated").eq_ignore_ascii_case("true"),
            next_continuation_token: get_option_text(&root, "NextContinuationToken"),
        })
    }
}
