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

//! Client for the S3 API subset the upload engine and backends need.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use log::debug;

use crate::engine::store::{PartRecord, RemoteStore, SessionHandle};
use crate::error::{Error, ErrorResponse};
use crate::s3::creds::Provider;
use crate::s3::http::BaseUrl;
use crate::s3::response::{
    CreateMultipartUploadResponse, ListMultipartUploadsResponse, ListObjectsResponse,
    ListPartsResponse, MultipartUpload, UploadedPart,
};
use crate::s3::signer::sign_v4_s3;
use crate::s3::utils::{
    Multimap, check_bucket_name, md5sum_hash, merge, sha256_hash, to_amz_date, utc_now,
};

/// SHA-256 of the empty payload.
const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

const MAX_KEYS_PER_PAGE: &str = "1000";

fn metadata_headers(metadata: &Multimap) -> Multimap {
    let mut headers = Multimap::new();
    for (key, values) in metadata.iter_all() {
        for value in values {
            headers.insert(format!("x-amz-meta-{}", key.to_lowercase()), value.clone());
        }
    }
    headers
}

/// Simple S3 client performing S3 operations over signed HTTP requests.
#[derive(Clone, Debug)]
pub struct Client {
    base_url: BaseUrl,
    provider: Option<Arc<dyn Provider>>,
    client: reqwest::Client,
    user_agent: String,
}

impl Client {
    /// Returns a client for given base URL. Requests go unsigned when no
    /// credential provider is given.
    pub fn new(base_url: BaseUrl, provider: Option<Arc<dyn Provider>>) -> Result<Client, Error> {
        let client = reqwest::Client::builder().no_gzip().build()?;
        Ok(Client {
            base_url,
            provider,
            client,
            user_agent: format!("SmartBackup/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Builds, signs and executes an HTTP request, returning the response
    /// only when the status indicates success.
    async fn execute(
        &self,
        method: Method,
        headers: &mut Multimap,
        query_params: &Multimap,
        bucket_name: Option<&str>,
        object_name: Option<&str>,
        body: Option<Bytes>,
    ) -> Result<reqwest::Response, Error> {
        let url = self
            .base_url
            .build_url(query_params, bucket_name, object_name)?;

        headers.insert(String::from("Host"), url.host_header_value());
        headers.insert(String::from("User-Agent"), self.user_agent.clone());

        let content_sha256 = match &body {
            Some(data) => {
                headers.insert(String::from("Content-Length"), data.len().to_string());
                sha256_hash(data)
            }
            None => String::from(EMPTY_SHA256),
        };
        headers.insert(String::from("x-amz-content-sha256"), content_sha256.clone());

        let date = utc_now();
        headers.insert(String::from("x-amz-date"), to_amz_date(date));

        if let Some(provider) = &self.provider {
            let creds = provider.fetch();
            if let Some(token) = creds.session_token {
                headers.insert(String::from("X-Amz-Security-Token"), token);
            }
            sign_v4_s3(
                &method,
                &url.path,
                &self.base_url.region,
                headers,
                query_params,
                &creds.access_key,
                &creds.secret_key,
                &content_sha256,
                date,
            );
        }

        debug!("{} {}", method, url);

        let mut req = self.client.request(method, url.to_string());
        for (key, values) in headers.iter_all() {
            for value in values {
                req = req.header(key.as_str(), value.as_str());
            }
        }
        if let Some(data) = body {
            req = req.body(data);
        }

        let resp = req.send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }

        Err(self.get_error_response(resp, bucket_name, object_name).await)
    }

    /// Maps a non-success response to an error, parsing the XML error body
    /// when the server sent one.
    async fn get_error_response(
        &self,
        resp: reqwest::Response,
        bucket_name: Option<&str>,
        object_name: Option<&str>,
    ) -> Error {
        let status_code = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut body = match resp.bytes().await {
            Ok(v) => v,
            Err(e) => return e.into(),
        };

        if !body.is_empty() {
            if !content_type.to_lowercase().contains("application/xml") {
                return Error::InvalidResponse(status_code, content_type);
            }
            return match ErrorResponse::parse(&mut body) {
                Ok(v) => Error::S3Error(v),
                Err(e) => e,
            };
        }

        let code = match status_code {
            301 => "PermanentRedirect",
            307 => "Redirect",
            400 => "BadRequest",
            403 => "AccessDenied",
            404 => {
                if object_name.is_some() {
                    "NoSuchKey"
                } else if bucket_name.is_some() {
                    "NoSuchBucket"
                } else {
                    "ResourceNotFound"
                }
            }
            405 | 501 => "MethodNotAllowed",
            409 => {
                if bucket_name.is_some() {
                    "NoSuchBucket"
                } else {
                    "ResourceConflict"
                }
            }
            _ => return Error::ServerError(status_code),
        };

        Error::S3Error(ErrorResponse {
            code: code.to_string(),
            message: format!("server failed with HTTP status code {}", status_code),
            bucket_name: bucket_name.unwrap_or_default().to_string(),
            object_name: object_name.unwrap_or_default().to_string(),
            ..Default::default()
        })
    }

    /// Starts a multipart upload and returns its upload ID. Metadata entries
    /// are carried as `x-amz-meta-` headers.
    pub async fn create_multipart_upload(
        &self,
        bucket_name: &str,
        object_name: &str,
        headers: &Multimap,
        metadata: &Multimap,
    ) -> Result<CreateMultipartUploadResponse, Error> {
        let mut headers = headers.clone();
        merge(&mut headers, &metadata_headers(metadata));

        let mut query_params = Multimap::new();
        query_params.insert(String::from("uploads"), String::new());

        let resp = self
            .execute(
                Method::POST,
                &mut headers,
                &query_params,
                Some(bucket_name),
                Some(object_name),
                None,
            )
            .await?;

        let mut body = resp.bytes().await?;
        CreateMultipartUploadResponse::parse(&mut body)
    }

    /// Lists in-progress multipart uploads whose keys start with `prefix`,
    /// walking all pages.
    pub async fn list_multipart_uploads(
        &self,
        bucket_name: &str,
        prefix: &str,
    ) -> Result<Vec<MultipartUpload>, Error> {
        let mut uploads = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;

        loop {
            let mut query_params = Multimap::new();
            query_params.insert(String::from("uploads"), String::new());
            query_params.insert(String::from("prefix"), prefix.to_string());
            query_params.insert(String::from("max-uploads"), MAX_KEYS_PER_PAGE.to_string());
            if let Some(v) = &key_marker {
                query_params.insert(String::from("key-marker"), v.clone());
            }
            if let Some(v) = &upload_id_marker {
                query_params.insert(String::from("upload-id-marker"), v.clone());
            }

            let resp = self
                .execute(
                    Method::GET,
                    &mut Multimap::new(),
                    &query_params,
                    Some(bucket_name),
                    None,
                    None,
                )
                .await?;

            let mut body = resp.bytes().await?;
            let page = ListMultipartUploadsResponse::parse(&mut body)?;
            uploads.extend(page.uploads);

            if !page.is_truncated {
                return Ok(uploads);
            }
            key_marker = page.next_key_marker;
            upload_id_marker = page.next_upload_id_marker;
        }
    }

    /// Uploads one part of a multipart upload and returns its ETag.
    pub async fn upload_part(
        &self,
        bucket_name: &str,
        object_name: &str,
        upload_id: &str,
        part_number: u16,
        data: Bytes,
    ) -> Result<String, Error> {
        if part_number == 0 {
            return Err(Error::InvalidPartNumber(String::from(
                "part number must be positive",
            )));
        }

        let mut headers = Multimap::new();
        headers.insert(String::from("Content-MD5"), md5sum_hash(&data));

        let mut query_params = Multimap::new();
        query_params.insert(String::from("partNumber"), part_number.to_string());
        query_params.insert(String::from("uploadId"), upload_id.to_string());

        let resp = self
            .execute(
                Method::PUT,
                &mut headers,
                &query_params,
                Some(bucket_name),
                Some(object_name),
                Some(data),
            )
            .await?;

        let etag = resp
            .headers()
            .get("etag")
            .map(|v| v.to_str())
            .transpose()?
            .unwrap_or_default()
            .trim_matches('"')
            .to_string();
        Ok(etag)
    }

    /// Lists the parts stored so far for given multipart upload, walking
    /// all pages.
    pub async fn list_parts(
        &self,
        bucket_name: &str,
        object_name: &str,
        upload_id: &str,
    ) -> Result<Vec<UploadedPart>, Error> {
        let mut parts = Vec::new();
        let mut part_number_marker: Option<u16> = None;

        loop {
            let mut query_params = Multimap::new();
            query_params.insert(String::from("uploadId"), upload_id.to_string());
            query_params.insert(String::from("max-parts"), MAX_KEYS_PER_PAGE.to_string());
            if let Some(v) = part_number_marker {
                query_params.insert(String::from("part-number-marker"), v.to_string());
            }

            let resp = self
                .execute(
                    Method::GET,
                    &mut Multimap::new(),
                    &query_params,
                    Some(bucket_name),
                    Some(object_name),
                    None,
                )
                .await?;

            let mut body = resp.bytes().await?;
            let page = ListPartsResponse::parse(&mut body)?;
            parts.extend(page.parts);

            if !page.is_truncated {
                return Ok(parts);
            }
            part_number_marker = page.next_part_number_marker;
        }
    }

    /// Assembles the uploaded parts into the final object.
    pub async fn complete_multipart_upload(
        &self,
        bucket_name: &str,
        object_name: &str,
        upload_id: &str,
        parts: &[PartRecord],
    ) -> Result<(), Error> {
        let mut data = String::from("<CompleteMultipartUpload>");
        for part in parts {
            data.push_str("<Part><PartNumber>");
            data.push_str(&part.number.to_string());
            data.push_str("</PartNumber><ETag>\"");
            data.push_str(&part.etag);
            data.push_str("\"</ETag></Part>");
        }
        data.push_str("</CompleteMultipartUpload>");
        let body = Bytes::from(data);

        let mut headers = Multimap::new();
        headers.insert(
            String::from("Content-Type"),
            String::from("application/xml"),
        );
        headers.insert(String::from("Content-MD5"), md5sum_hash(&body));

        let mut query_params = Multimap::new();
        query_params.insert(String::from("uploadId"), upload_id.to_string());

        self.execute(
            Method::POST,
            &mut headers,
            &query_params,
            Some(bucket_name),
            Some(object_name),
            Some(body),
        )
        .await?;
        Ok(())
    }

    /// Aborts a multipart upload, discarding its parts.
    pub async fn abort_multipart_upload(
        &self,
        bucket_name: &str,
        object_name: &str,
        upload_id: &str,
    ) -> Result<(), Error> {
        let mut query_params = Multimap::new();
        query_params.insert(String::from("uploadId"), upload_id.to_string());

        self.execute(
            Method::DELETE,
            &mut Multimap::new(),
            &query_params,
            Some(bucket_name),
            Some(object_name),
            None,
        )
        .await?;
        Ok(())
    }

    /// Uploads an object in a single PUT.
    pub async fn put_object(
        &self,
        bucket_name: &str,
        object_name: &str,
        headers: &Multimap,
        metadata: &Multimap,
        data: Bytes,
    ) -> Result<(), Error> {
        let mut headers = headers.clone();
        merge(&mut headers, &metadata_headers(metadata));
        headers.insert(String::from("Content-MD5"), md5sum_hash(&data));

        self.execute(
            Method::PUT,
            &mut headers,
            &Multimap::new(),
            Some(bucket_name),
            Some(object_name),
            Some(data),
        )
        .await?;
        Ok(())
    }

    /// Checks whether an object exists. A missing key is not an error.
    pub async fn object_exists(
        &self,
        bucket_name: &str,
        object_name: &str,
    ) -> Result<bool, Error> {
        let res = self
            .execute(
                Method::HEAD,
                &mut Multimap::new(),
                &Multimap::new(),
                Some(bucket_name),
                Some(object_name),
                None,
            )
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(Error::S3Error(er)) if er.code == "NoSuchKey" => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Applies a canned ACL to an existing object.
    pub async fn set_object_acl(
        &self,
        bucket_name: &str,
        object_name: &str,
        acl: &str,
    ) -> Result<(), Error> {
        let mut headers = Multimap::new();
        headers.insert(String::from("x-amz-acl"), acl.to_string());

        let mut query_params = Multimap::new();
        query_params.insert(String::from("acl"), String::new());

        self.execute(
            Method::PUT,
            &mut headers,
            &query_params,
            Some(bucket_name),
            Some(object_name),
            None,
        )
        .await?;
        Ok(())
    }

    /// Downloads an object in full.
    pub async fn get_object(&self, bucket_name: &str, object_name: &str) -> Result<Bytes, Error> {
        let resp = self
            .execute(
                Method::GET,
                &mut Multimap::new(),
                &Multimap::new(),
                Some(bucket_name),
                Some(object_name),
                None,
            )
            .await?;
        Ok(resp.bytes().await?)
    }

    /// Removes an object.
    pub async fn remove_object(&self, bucket_name: &str, object_name: &str) -> Result<(), Error> {
        self.execute(
            Method::DELETE,
            &mut Multimap::new(),
            &Multimap::new(),
            Some(bucket_name),
            Some(object_name),
            None,
        )
        .await?;
        Ok(())
    }

    /// Lists object keys starting with `prefix`, walking all pages.
    pub async fn list_objects(
        &self,
        bucket_name: &str,
        prefix: &str,
    ) -> Result<Vec<String>, Error> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut query_params = Multimap::new();
            query_params.insert(String::from("list-type"), String::from("2"));
            query_params.insert(String::from("prefix"), prefix.to_string());
            query_params.insert(String::from("max-keys"), MAX_KEYS_PER_PAGE.to_string());
            if let Some(v) = &continuation_token {
                query_params.insert(String::from("continuation-token"), v.clone());
            }

            let resp = self
                .execute(
                    Method::GET,
                    &mut Multimap::new(),
                    &query_params,
                    Some(bucket_name),
                    None,
                    None,
                )
                .await?;

            let mut body = resp.bytes().await?;
            let page = ListObjectsResponse::parse(&mut body)?;
            keys.extend(page.keys);

            if !page.is_truncated {
                return Ok(keys);
            }
            continuation_token = page.next_continuation_token;
        }
    }
}

/// A client bound to one bucket. This is what the upload engine drives.
#[derive(Clone, Debug)]
pub struct BucketClient {
    client: Client,
    bucket_name: String,
}

impl BucketClient {
    pub fn new(client: Client, bucket_name: &str) -> Result<BucketClient, Error> {
        check_bucket_name(bucket_name, true)?;
        Ok(BucketClient {
            client,
            bucket_name: bucket_name.to_string(),
        })
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl RemoteStore for BucketClient {
    async fn create_session(
        &self,
        key: &str,
        headers: &Multimap,
        metadata: &Multimap,
    ) -> Result<String, Error> {
        let resp = self
            .client
            .create_multipart_upload(&self.bucket_name, key, headers, metadata)
            .await?;
        Ok(resp.upload_id)
    }

    async fn list_sessions(&self, key: &str) -> Result<Vec<SessionHandle>, Error> {
        let uploads = self
            .client
            .list_multipart_uploads(&self.bucket_name, key)
            .await?;
        Ok(uploads
            .into_iter()
            .filter(|u| u.key == key)
            .map(|u| SessionHandle {
                key: u.key,
                session_id: u.upload_id,
            })
            .collect())
    }

    async fn upload_part(
        &self,
        key: &str,
        session_id: &str,
        part_number: u16,
        data: Bytes,
    ) -> Result<PartRecord, Error> {
        let etag = self
            .client
            .upload_part(&self.bucket_name, key, session_id, part_number, data)
            .await?;
        Ok(PartRecord {
            number: part_number,
            etag,
        })
    }

    async fn list_parts(&self, key: &str, session_id: &str) -> Result<Vec<PartRecord>, Error> {
        let parts = self
            .client
            .list_parts(&self.bucket_name, key, session_id)
            .await?;
        Ok(parts
            .into_iter()
            .map(|p| PartRecord {
                number: p.number,
                etag: p.etag,
            })
            .collect())
    }

    async fn complete_session(
        &self,
        key: &str,
        session_id: &str,
        parts: &[PartRecord],
    ) -> Result<(), Error> {
        self.client
            .complete_multipart_upload(&self.bucket_name, key, session_id, parts)
            .await
    }

    async fn abort_session(&self, key: &str, session_id: &str) -> Result<(), Error> {
        self.client
            .abort_multipart_upload(&self.bucket_name, key, session_id)
            .await
    }

    async fn put_object(
        &self,
        key: &str,
        headers: &Multimap,
        metadata: &Multimap,
        data: Bytes,
    ) -> Result<(), Error> {
        self.client
            .put_object(&self.bucket_name, key, headers, metadata, data)
            .await
    }

    async fn object_exists(&self, key: &str) -> Result<bool, Error> {
        self.client.object_exists(&self.bucket_name, key).await
    }

    async fn set_object_policy(&self, key: &str, policy: &str) -> Result<(), Error> {
        self.client
            .set_object_acl(&self.bucket_name, key, policy)
            .await
    }
}
