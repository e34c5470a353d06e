use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use vidsub_core::models::{UploadRecord, UploadStatus};
use vidsub_core::{StorageBackend, VideoError, VideoResult};

/// Persistence for upload records. At most one record exists per submission.
#[async_trait]
pub trait UploadRecordStore: Send + Sync {
    async fn get_by_submission(&self, submission_id: i64) -> VideoResult<Option<UploadRecord>>;

    async fn get_by_remote_key(&self, remote_key: &str) -> VideoResult<Option<UploadRecord>>;

    /// Most recently created record owned by `user_id` for `assignment_id`.
    async fn find_for_owner(
        &self,
        user_id: i64,
        assignment_id: i64,
    ) -> VideoResult<Option<UploadRecord>>;

    /// Atomically remove any record for the submission and insert `record`.
    /// Returns the record that was replaced.
    async fn replace_for_submission(
        &self,
        record: &UploadRecord,
    ) -> VideoResult<Option<UploadRecord>>;

    /// Overwrite the record with the same id. `NotFound` if it was replaced
    /// or removed in the meantime.
    async fn update(&self, record: &UploadRecord) -> VideoResult<()>;

    async fn delete_by_submission(&self, submission_id: i64) -> VideoResult<bool>;

    /// Ready or error records, not yet deleted, uploaded before `cutoff`.
    async fn find_expired(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> VideoResult<Vec<UploadRecord>>;

    async fn list_for_user(&self, user_id: i64) -> VideoResult<Vec<UploadRecord>>;

    async fn delete_for_user(&self, user_id: i64) -> VideoResult<u64>;

    async fn ping(&self) -> VideoResult<()>;
}

/// PostgreSQL-backed upload records.
#[derive(Clone)]
pub struct UploadRecordRepository {
    pool: PgPool,
}

impl UploadRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, submission_id, assignment_id, user_id, backend, remote_key, status,
           file_size, duration_seconds, uploaded_at, deleted_at, error_message,
           created_at, updated_at
    FROM video_uploads
"#;

struct UploadRecordRow(UploadRecord);

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for UploadRecordRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let backend: String = row.try_get("backend")?;
        Ok(UploadRecordRow(UploadRecord {
            id: row.try_get("id")?,
            submission_id: row.try_get("submission_id")?,
            assignment_id: row.try_get("assignment_id")?,
            user_id: row.try_get("user_id")?,
            backend: StorageBackend::from_str(&backend)
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
            remote_key: row.try_get("remote_key")?,
            status: UploadStatus::from_str(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            file_size: row.try_get("file_size")?,
            duration_seconds: row.try_get("duration_seconds")?,
            uploaded_at: row.try_get("uploaded_at")?,
            deleted_at: row.try_get("deleted_at")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}

#[async_trait]
impl UploadRecordStore for UploadRecordRepository {
    async fn get_by_submission(&self, submission_id: i64) -> VideoResult<Option<UploadRecord>> {
        let sql = format!("{} WHERE submission_id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, UploadRecordRow>(&sql)
            .bind(submission_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    async fn get_by_remote_key(&self, remote_key: &str) -> VideoResult<Option<UploadRecord>> {
        let sql = format!(
            "{} WHERE remote_key = $1 ORDER BY created_at DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, UploadRecordRow>(&sql)
            .bind(remote_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    async fn find_for_owner(
        &self,
        user_id: i64,
        assignment_id: i64,
    ) -> VideoResult<Option<UploadRecord>> {
        let sql = format!(
            "{} WHERE user_id = $1 AND assignment_id = $2 ORDER BY created_at DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, UploadRecordRow>(&sql)
            .bind(user_id)
            .bind(assignment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    async fn replace_for_submission(
        &self,
        record: &UploadRecord,
    ) -> VideoResult<Option<UploadRecord>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("{} WHERE submission_id = $1 FOR UPDATE", SELECT_COLUMNS);
        let previous = sqlx::query_as::<_, UploadRecordRow>(&sql)
            .bind(record.submission_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|r| r.0);

        sqlx::query("DELETE FROM video_uploads WHERE submission_id = $1")
            .bind(record.submission_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO video_uploads (
                id, submission_id, assignment_id, user_id, backend, remote_key, status,
                file_size, duration_seconds, uploaded_at, deleted_at, error_message,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id)
        .bind(record.submission_id)
        .bind(record.assignment_id)
        .bind(record.user_id)
        .bind(record.backend.to_string())
        .bind(&record.remote_key)
        .bind(record.status.as_str())
        .bind(record.file_size)
        .bind(record.duration_seconds)
        .bind(record.uploaded_at)
        .bind(record.deleted_at)
        .bind(&record.error_message)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(previous)
    }

    async fn update(&self, record: &UploadRecord) -> VideoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE video_uploads
            SET status = $2, file_size = $3, duration_seconds = $4, uploaded_at = $5,
                deleted_at = $6, error_message = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.status.as_str())
        .bind(record.file_size)
        .bind(record.duration_seconds)
        .bind(record.uploaded_at)
        .bind(record.deleted_at)
        .bind(&record.error_message)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(VideoError::NotFound(format!(
                "Upload record for submission {} no longer exists",
                record.submission_id
            )));
        }
        Ok(())
    }

    async fn delete_by_submission(&self, submission_id: i64) -> VideoResult<bool> {
        let result = sqlx::query("DELETE FROM video_uploads WHERE submission_id = $1")
            .bind(submission_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_expired(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> VideoResult<Vec<UploadRecord>> {
        let sql = format!(
            r#"{}
            WHERE status IN ('ready', 'error')
              AND deleted_at IS NULL
              AND uploaded_at IS NOT NULL
              AND uploaded_at < $1
            ORDER BY uploaded_at
            LIMIT $2"#,
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, UploadRecordRow>(&sql)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn list_for_user(&self, user_id: i64) -> VideoResult<Vec<UploadRecord>> {
        let sql = format!("{} WHERE user_id = $1 ORDER BY created_at", SELECT_COLUMNS);
        let rows = sqlx::query_as::<_, UploadRecordRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn delete_for_user(&self, user_id: i64) -> VideoResult<u64> {
        let result = sqlx::query("DELETE FROM video_uploads WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> VideoResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
