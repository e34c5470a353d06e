use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use vidsub_core::models::{AuditEventType, AuditLogEntry};
use vidsub_core::VideoResult;

/// Append-only audit trail.
#[async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn insert(&self, entry: &AuditLogEntry) -> VideoResult<()>;

    /// Newest first.
    async fn list_by_submission(
        &self,
        submission_id: i64,
        limit: i64,
    ) -> VideoResult<Vec<AuditLogEntry>>;

    /// Remove every entry where the user is the actor or the subject.
    async fn delete_for_user(&self, user_id: i64) -> VideoResult<u64>;
}

#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct AuditLogRow(AuditLogEntry);

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for AuditLogRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        let event_type: String = row.try_get("event_type")?;
        Ok(AuditLogRow(AuditLogEntry {
            id: row.try_get("id")?,
            event_type: AuditEventType::from_str(&event_type)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            actor_id: row.try_get("actor_id")?,
            subject_user_id: row.try_get("subject_user_id")?,
            submission_id: row.try_get("submission_id")?,
            assignment_id: row.try_get("assignment_id")?,
            remote_key: row.try_get("remote_key")?,
            error_code: row.try_get("error_code")?,
            error_message: row.try_get("error_message")?,
            context: row.try_get("context")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

#[async_trait]
impl AuditLogStore for AuditLogRepository {
    async fn insert(&self, entry: &AuditLogEntry) -> VideoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO video_audit_log (
                id, event_type, actor_id, subject_user_id, submission_id, assignment_id,
                remote_key, error_code, error_message, context, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.event_type.as_str())
        .bind(entry.actor_id)
        .bind(entry.subject_user_id)
        .bind(entry.submission_id)
        .bind(entry.assignment_id)
        .bind(&entry.remote_key)
        .bind(&entry.error_code)
        .bind(&entry.error_message)
        .bind(&entry.context)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_submission(
        &self,
        submission_id: i64,
        limit: i64,
    ) -> VideoResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT id, event_type, actor_id, subject_user_id, submission_id, assignment_id,
                   remote_key, error_code, error_message, context, created_at
            FROM video_audit_log
            WHERE submission_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(submission_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn delete_for_user(&self, user_id: i64) -> VideoResult<u64> {
        let result = sqlx::query(
            "DELETE FROM video_audit_log WHERE actor_id = $1 OR subject_user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
