//! Mapping of S3 SDK failures onto [`StoreError`].

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use bm_error::StoreError;

/// Convert an SDK error into a [`StoreError`] the retry policy can classify.
pub fn map_sdk_error<E>(err: SdkError<E>, context: &str) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = format!("{context}: {}", DisplayErrorContext(&err));

    match &err {
        SdkError::TimeoutError(_) => return StoreError::Timeout(message),
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            return StoreError::Timeout(message);
        }
        SdkError::DispatchFailure(_) => return StoreError::Network(message),
        _ => {}
    }

    let status = err.raw_response().map(|r| r.status().as_u16());
    classify_remote(err.code(), status, message)
}

/// Map an S3 error code, falling back to the HTTP status.
pub fn classify_remote(code: Option<&str>, status: Option<u16>, message: String) -> StoreError {
    match code {
        Some("NoSuchKey" | "NoSuchBucket" | "NotFound") => StoreError::NotFound(message),
        Some(
            "AccessDenied" | "AllAccessDisabled" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
            | "AccountProblem",
        ) => StoreError::AccessDenied(message),
        Some("InvalidRequest" | "InvalidArgument" | "KeyTooLongError" | "InvalidObjectName") => {
            StoreError::InvalidKey(message)
        }
        Some(
            "SlowDown" | "Throttling" | "ThrottlingException" | "TooManyRequests"
            | "RequestLimitExceeded",
        ) => StoreError::Throttled(message),
        Some("RequestTimeout") => StoreError::Timeout(message),
        Some("InternalError" | "ServiceUnavailable") => StoreError::Unavailable(message),
        Some("NotImplemented") => StoreError::CopyUnsupported(message),
        _ => match status {
            Some(404) => StoreError::NotFound(message),
            Some(403) => StoreError::AccessDenied(message),
            Some(408) => StoreError::Timeout(message),
            Some(429) => StoreError::Throttled(message),
            Some(501) => StoreError::CopyUnsupported(message),
            Some(500..=599) => StoreError::Unavailable(message),
            Some(400..=499) => StoreError::InvalidKey(message),
            _ => StoreError::Other(message),
        },
    }
}
