//! S3-compatible object storage backend.
//!
//! Works against any endpoint speaking the S3 API (AWS, MinIO, R2,
//! Backblaze, ...). Addressing is path-style, credentials are static, and
//! the endpoint URL comes from configuration — nothing is resolved from
//! ambient AWS environment state.

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::ObjectStore;

/// Connection settings for one S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    /// Endpoint URL, e.g. `http://127.0.0.1:9000`.
    pub endpoint: String,
    /// Region name. Most S3-compatible stores accept any value.
    pub region: String,
    /// Bucket holding snapshot objects.
    pub bucket: String,
    /// Static access key id.
    pub access_key_id: String,
    /// Static secret access key.
    pub secret_access_key: String,
}

/// Object store backed by an S3-compatible endpoint.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a store from connection settings.
    pub fn new(config: S3StoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "torpor-config",
        );
        let sdk_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .endpoint_url(config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket,
        }
    }
}

/// Whether an SDK error means the endpoint itself was unreachable, as
/// opposed to the service answering with an error.
fn is_unreachable<E, R>(err: &SdkError<E, R>) -> bool {
    matches!(err, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_))
}

/// HTTP status of the raw response, if the service answered at all.
fn response_status<E>(err: &SdkError<E, aws_sdk_s3::config::http::HttpResponse>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        debug!(key, size = data.len(), bucket = %self.bucket, "s3 put");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| {
                if is_unreachable(&err) {
                    StoreError::Unreachable(err.to_string())
                } else {
                    StoreError::Backend(err.into_service_error().to_string())
                }
            })?;
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<bool, StoreError> {
        debug!(key, size = data.len(), bucket = %self.bucket, "s3 conditional put");
        match self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .if_none_match("*")
            .body(ByteStream::from(data))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_unreachable(&err) => Err(StoreError::Unreachable(err.to_string())),
            // 412 Precondition Failed: the key already exists.
            Err(err) if response_status(&err) == Some(412) => Ok(false),
            Err(err) => Err(StoreError::Backend(err.into_service_error().to_string())),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => {
                let data = out
                    .body
                    .collect()
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?
                    .into_bytes();
                Ok(Some(data))
            }
            Err(err) if is_unreachable(&err) => Err(StoreError::Unreachable(err.to_string())),
            Err(err) => {
                let service = err.into_service_error();
                if service.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(StoreError::Backend(service.to_string()))
                }
            }
        }
    }

    async fn get_range(
        &self,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Option<Bytes>, StoreError> {
        if length == 0 {
            return Ok(Some(Bytes::new()));
        }

        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(format!("bytes={}-{}", offset, offset + length - 1))
            .send()
            .await
        {
            Ok(out) => {
                let data = out
                    .body
                    .collect()
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?
                    .into_bytes();
                Ok(Some(data))
            }
            Err(err) if is_unreachable(&err) => Err(StoreError::Unreachable(err.to_string())),
            // 416 Range Not Satisfiable: the offset lies past the object end.
            Err(err) if response_status(&err) == Some(416) => Err(StoreError::InvalidRange {
                key: key.to_string(),
                offset,
                length,
            }),
            Err(err) => {
                let service = err.into_service_error();
                if service.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(StoreError::Backend(service.to_string()))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        debug!(key, bucket = %self.bucket, "s3 delete");
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if is_unreachable(&err) {
                    StoreError::Unreachable(err.to_string())
                } else {
                    StoreError::Backend(err.into_service_error().to_string())
                }
            })?;
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_unreachable(&err) => Err(StoreError::Unreachable(err.to_string())),
            Err(err) => {
                let service = err.into_service_error();
                if service.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Backend(service.to_string()))
                }
            }
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| {
                if is_unreachable(&err) {
                    StoreError::Unreachable(err.to_string())
                } else {
                    StoreError::Backend(err.into_service_error().to_string())
                }
            })?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }
        }
        Ok(keys)
    }
}
