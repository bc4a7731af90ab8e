//! Multipart copy for sources over the single-request `CopyObject` limit.

use crate::error::map_sdk_error;
use crate::store::copy_source;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bm_error::{StoreError, StoreResult};
use bm_types::ObjectKey;
use tracing::{debug, info, warn};

const MIB: u64 = 1024 * 1024;

/// Largest source a single `CopyObject` accepts.
pub const MAX_ATOMIC_COPY_SIZE: u64 = 5 * 1024 * MIB;

/// Default size of each `UploadPartCopy` range.
pub const DEFAULT_PART_SIZE: u64 = 512 * MIB;

const MAX_PARTS: u64 = 10_000;

/// Whether a `CopyObject` rejection means the source is too large for it.
pub fn copy_too_large(code: Option<&str>, message: Option<&str>) -> bool {
    code == Some("InvalidRequest")
        && message.is_some_and(|m| m.contains("maximum allowable size"))
}

/// Part numbers and `bytes=start-end` ranges covering `size` bytes.
///
/// The part size grows past [`DEFAULT_PART_SIZE`] when needed to stay within
/// the 10,000-part limit.
pub fn part_ranges(size: u64) -> Vec<(i32, String)> {
    if size == 0 {
        return Vec::new();
    }
    let part_size = DEFAULT_PART_SIZE.max(size.div_ceil(MAX_PARTS));

    (0..size.div_ceil(part_size))
        .map(|i| {
            let start = i * part_size;
            let end = (start + part_size).min(size) - 1;
            (i as i32 + 1, format!("bytes={start}-{end}"))
        })
        .collect()
}

/// Copy `key` part by part, aborting the upload if any part fails.
pub async fn multipart_copy(
    client: &Client,
    source_bucket: &str,
    dest_bucket: &str,
    key: &ObjectKey,
) -> StoreResult<()> {
    let head = client
        .head_object()
        .bucket(source_bucket)
        .key(key.as_str())
        .send()
        .await
        .map_err(|e| map_sdk_error(e, &format!("head {source_bucket}/{key}")))?;
    let size = head
        .content_length()
        .and_then(|len| u64::try_from(len).ok())
        .unwrap_or(0);

    let created = client
        .create_multipart_upload()
        .bucket(dest_bucket)
        .key(key.as_str())
        .send()
        .await
        .map_err(|e| map_sdk_error(e, &format!("create multipart upload {key}")))?;
    let upload_id = created
        .upload_id()
        .ok_or_else(|| StoreError::Other(format!("no upload id for {key}")))?
        .to_string();

    let ranges = part_ranges(size);
    info!(key = %key, bytes = size, parts = ranges.len(), "Starting multipart copy");

    let copied = copy_parts(client, source_bucket, dest_bucket, key, &upload_id, ranges).await;
    let parts = match copied {
        Ok(parts) => parts,
        Err(e) => {
            abort(client, dest_bucket, key, &upload_id).await;
            return Err(e);
        }
    };

    let completed = client
        .complete_multipart_upload()
        .bucket(dest_bucket)
        .key(key.as_str())
        .upload_id(&upload_id)
        .multipart_upload(
            CompletedMultipartUpload::builder()
                .set_parts(Some(parts))
                .build(),
        )
        .send()
        .await;
    if let Err(e) = completed {
        abort(client, dest_bucket, key, &upload_id).await;
        return Err(map_sdk_error(e, &format!("complete multipart upload {key}")));
    }

    debug!(key = %key, "Multipart copy complete");
    Ok(())
}

async fn copy_parts(
    client: &Client,
    source_bucket: &str,
    dest_bucket: &str,
    key: &ObjectKey,
    upload_id: &str,
    ranges: Vec<(i32, String)>,
) -> StoreResult<Vec<CompletedPart>> {
    let source = copy_source(source_bucket, key.as_str());
    let mut parts = Vec::with_capacity(ranges.len());

    for (part_number, range) in ranges {
        let response = client
            .upload_part_copy()
            .bucket(dest_bucket)
            .key(key.as_str())
            .upload_id(upload_id)
            .part_number(part_number)
            .copy_source(&source)
            .copy_source_range(range)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("copy part {part_number} of {key}")))?;

        let e_tag = response
            .copy_part_result()
            .and_then(|r| r.e_tag())
            .ok_or_else(|| StoreError::Other(format!("no ETag for part {part_number} of {key}")))?;

        parts.push(
            CompletedPart::builder()
                .e_tag(e_tag)
                .part_number(part_number)
                .build(),
        );
    }

    Ok(parts)
}

async fn abort(client: &Client, dest_bucket: &str, key: &ObjectKey, upload_id: &str) {
    let aborted = client
        .abort_multipart_upload()
        .bucket(dest_bucket)
        .key(key.as_str())
        .upload_id(upload_id)
        .send()
        .await;
    if let Err(e) = aborted {
        warn!(key = %key, upload_id, error = %e, "Failed to abort multipart upload");
    }
}
