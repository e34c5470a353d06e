//! Who may view which video.

use std::sync::Arc;
use vidsub_core::models::{Principal, UploadRecord};
use vidsub_core::{VideoError, VideoResult};
use vidsub_db::UploadRecordStore;

#[derive(Clone)]
pub struct AccessGate {
    records: Arc<dyn UploadRecordStore>,
}

impl AccessGate {
    pub fn new(records: Arc<dyn UploadRecordStore>) -> Self {
        Self { records }
    }

    /// Owners see their own submission, graders see every submission of an
    /// assignment they grade, site admins see everything.
    pub fn can_view(principal: &Principal, owner_id: i64, assignment_id: i64) -> bool {
        principal.user_id == owner_id || principal.can_grade(assignment_id)
    }

    /// Resolve the record the caller asks for and check they may view it.
    ///
    /// A missing record, or one whose remote key differs from `remote_key`, is
    /// an invalid identifier rather than a permission problem.
    pub async fn authorize_view(
        &self,
        principal: &Principal,
        submission_id: i64,
        remote_key: &str,
    ) -> VideoResult<UploadRecord> {
        let record = self
            .records
            .get_by_submission(submission_id)
            .await?
            .ok_or_else(|| {
                VideoError::InvalidIdentifier(format!(
                    "No video is attached to submission {}",
                    submission_id
                ))
            })?;

        if remote_key.is_empty() || record.remote_key != remote_key {
            return Err(VideoError::InvalidIdentifier(
                "The video identifier does not match this submission".to_string(),
            ));
        }

        if !Self::can_view(principal, record.user_id, record.assignment_id) {
            tracing::debug!(
                user_id = principal.user_id,
                submission_id,
                "Playback denied"
            );
            return Err(VideoError::PermissionDenied(format!(
                "User {} may not view submission {}",
                principal.user_id, submission_id
            )));
        }

        Ok(record)
    }
}
