//! S3 adapter for bucket-migrate.
//!
//! [`S3Store`] implements [`bm_traits::ObjectStore`] on top of the AWS SDK.
//! The SDK's own retries are disabled so the pipeline's retry policy sees,
//! and counts, every attempt. Sources too large for a single `CopyObject`
//! are copied with `UploadPartCopy`.

mod client;
mod error;
mod multipart;
mod store;

pub use client::{S3Config, create_s3_client};
pub use error::{classify_remote, map_sdk_error};
pub use store::{S3Store, copy_source};
