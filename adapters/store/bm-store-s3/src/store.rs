//! [`ObjectStore`] backed by the AWS S3 SDK.

use crate::client::{S3Config, create_s3_client};
use crate::error::map_sdk_error;
use crate::multipart::{copy_too_large, multipart_copy};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use bm_error::{StoreError, StoreResult};
use bm_traits::{ListPage, ListRequest, ObjectStore};
use bm_types::ObjectKey;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, trace};

/// Characters left as-is in the `x-amz-copy-source` header.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Value of the copy-source header for `bucket/key`.
pub fn copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", utf8_percent_encode(key, COPY_SOURCE))
}

/// S3-compatible object store.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Wrap an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from configuration.
    pub async fn from_config(config: &S3Config) -> Self {
        Self::new(create_s3_client(config).await)
    }

    /// Underlying SDK client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(&self, request: &ListRequest) -> StoreResult<ListPage> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&request.bucket)
            .set_prefix(request.prefix.clone())
            .set_max_keys(request.max_keys)
            .set_continuation_token(request.continuation_token.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("list {}", request.bucket)))?;

        let keys = response
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .map(ObjectKey::from)
            .collect();

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage { keys, next_token })
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        dest_bucket: &str,
        key: &ObjectKey,
    ) -> StoreResult<()> {
        trace!(key = %key, source = source_bucket, destination = dest_bucket, "CopyObject");

        let copied = self
            .client
            .copy_object()
            .copy_source(copy_source(source_bucket, key.as_str()))
            .bucket(dest_bucket)
            .key(key.as_str())
            .send()
            .await;

        match copied {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| copy_too_large(s.code(), s.message())) =>
            {
                debug!(key = %key, "Source exceeds CopyObject limit, switching to multipart copy");
                multipart_copy(&self.client, source_bucket, dest_bucket, key).await
            }
            Err(e) => Err(map_sdk_error(e, &format!("copy {key}"))),
        }
    }

    async fn get_object(&self, bucket: &str, key: &ObjectKey) -> StoreResult<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("get {bucket}/{key}")))?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Network(format!("read {bucket}/{key}: {e}")))?;

        Ok(body.into_bytes())
    }

    async fn put_object(&self, bucket: &str, key: &ObjectKey, body: Bytes) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key.as_str())
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("put {bucket}/{key}")))?;

        Ok(())
    }
}
