//! LocalStack test context and utilities.

use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{Credentials, Region};
use bm_store_s3::{S3Config, S3Store};
use std::time::{SystemTime, UNIX_EPOCH};

const REGION: &str = "us-east-1";

/// LocalStack test context with a raw S3 client for fixtures.
pub struct LocalStackTestContext {
    pub s3: S3Client,
    pub endpoint: String,
}

impl LocalStackTestContext {
    /// Create a new LocalStack test context.
    ///
    /// Uses the `LOCALSTACK_ENDPOINT` environment variable if set,
    /// otherwise defaults to `http://localhost:4566`.
    pub async fn new() -> Self {
        let endpoint = std::env::var("LOCALSTACK_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4566".to_string());

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(REGION))
            .endpoint_url(&endpoint)
            .credentials_provider(Credentials::new("test", "test", None, None, "localstack"))
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();

        Self {
            s3: S3Client::from_conf(s3_config),
            endpoint,
        }
    }

    /// Check if LocalStack is available and healthy.
    pub async fn is_available(&self) -> bool {
        self.s3.list_buckets().send().await.is_ok()
    }

    /// Store under test, configured the way the CLI configures it.
    pub async fn store(&self) -> S3Store {
        let config = S3Config::new()
            .with_endpoint(&self.endpoint)
            .with_region(REGION)
            .with_credentials("test", "test")
            .with_timeout(10);
        S3Store::from_config(&config).await
    }

    /// Create an S3 bucket.
    pub async fn create_bucket(&self, name: &str) -> Result<(), aws_sdk_s3::Error> {
        self.s3.create_bucket().bucket(name).send().await?;
        Ok(())
    }

    /// Upload an object.
    pub async fn put(&self, bucket: &str, key: &str, body: &str) -> Result<(), aws_sdk_s3::Error> {
        self.s3
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body.as_bytes().to_vec().into())
            .send()
            .await?;
        Ok(())
    }

    /// Read an object as UTF-8.
    pub async fn get(&self, bucket: &str, key: &str) -> Option<String> {
        let response = self.s3.get_object().bucket(bucket).key(key).send().await.ok()?;
        let bytes = response.body.collect().await.ok()?.into_bytes();
        String::from_utf8(bytes.to_vec()).ok()
    }

    /// List every key in a bucket, following continuation tokens.
    pub async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, aws_sdk_s3::Error> {
        let mut keys = Vec::new();
        let mut token = None;
        loop {
            let result = self
                .s3
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(token)
                .send()
                .await?;
            keys.extend(
                result
                    .contents()
                    .iter()
                    .filter_map(|o| o.key().map(String::from)),
            );
            match result.next_continuation_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(keys)
    }
}

/// Bucket name unique to this test run.
pub fn unique_bucket(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{prefix}-{}", nanos % 1_000_000_000_000)
}
