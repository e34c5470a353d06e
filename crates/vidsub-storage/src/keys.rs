use crate::traits::{StorageError, StorageResult};
use std::time::Duration;
use uuid::Uuid;
use vidsub_core::constants::MAX_PLAYBACK_TTL_SECS;
use vidsub_core::validation::{extension_for_mime, validate_remote_key};

/// Object key for an S3 upload: `submissions/{assignment}/{submission}/{uuid}.{ext}`.
pub(crate) fn submission_object_key(
    assignment_id: i64,
    submission_id: i64,
    mime_type: Option<&str>,
) -> StorageResult<String> {
    let ext = extension_for_mime(mime_type.unwrap_or("video/mp4"))
        .map_err(|e| StorageError::Validation(e.to_string()))?;
    Ok(format!(
        "submissions/{}/{}/{}.{}",
        assignment_id,
        submission_id,
        Uuid::new_v4(),
        ext
    ))
}

pub(crate) fn check_remote_key(remote_key: &str) -> StorageResult<()> {
    validate_remote_key(remote_key).map_err(|e| StorageError::InvalidKey(e.to_string()))
}

/// Playback lifetimes must be positive and at most seven days.
pub(crate) fn check_playback_ttl(ttl: Duration) -> StorageResult<u64> {
    let secs = ttl.as_secs();
    if secs == 0 || secs > MAX_PLAYBACK_TTL_SECS {
        return Err(StorageError::Validation(format!(
            "Playback lifetime must be between 1 and {} seconds (got {})",
            MAX_PLAYBACK_TTL_SECS, secs
        )));
    }
    Ok(secs)
}
