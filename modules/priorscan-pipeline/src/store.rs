use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use priorscan_common::{MatchRecord, Scan, ScanStatus};

/// Persistence seam for the pipeline. One trait so the whole run can be
/// exercised against an in-memory store: no network, no database.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Read one scan row.
    async fn fetch_scan(&self, id: Uuid) -> Result<Option<Scan>>;

    /// Atomically claim the scan for this run. Returns false if another run
    /// already claimed it or the scan is no longer `processing`.
    async fn claim(&self, id: Uuid) -> Result<bool>;

    /// Cache the scan's embedding for reuse without recomputation.
    async fn cache_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()>;

    /// Write the full match set in one atomic batch: all rows or none.
    async fn insert_matches(&self, scan_id: Uuid, matches: &[MatchRecord]) -> Result<()>;

    /// Advance the scan's lifecycle status.
    async fn set_status(&self, id: Uuid, status: ScanStatus) -> Result<()>;
}

/// Postgres-backed store.
pub struct PgScanStore {
    pool: PgPool,
}

impl PgScanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type ScanTuple = (
    Uuid,
    Option<Uuid>,
    String,
    Option<String>,
    Option<serde_json::Value>,
    String,
    DateTime<Utc>,
);

#[async_trait]
impl ScanStore for PgScanStore {
    async fn fetch_scan(&self, id: Uuid) -> Result<Option<Scan>> {
        let row = sqlx::query_as::<_, ScanTuple>(
            r#"
            SELECT id, user_id, input_text, image_url, embedding, status, created_at
            FROM scans
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch scan")?;

        let Some((id, user_id, input_text, image_url, embedding, status, created_at)) = row else {
            return Ok(None);
        };

        let status = ScanStatus::parse(&status)
            .ok_or_else(|| anyhow!("Unknown scan status in database: {status}"))?;
        let embedding = embedding.and_then(|v| serde_json::from_value::<Vec<f32>>(v).ok());

        Ok(Some(Scan {
            id,
            user_id,
            input_text,
            image_url,
            embedding,
            status,
            created_at,
        }))
    }

    async fn claim(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scans
            SET claimed_at = now()
            WHERE id = $1 AND status = 'processing' AND claimed_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to claim scan")?;

        Ok(result.rows_affected() == 1)
    }

    async fn cache_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        sqlx::query("UPDATE scans SET embedding = $2 WHERE id = $1")
            .bind(id)
            .bind(serde_json::to_value(embedding)?)
            .execute(&self.pool)
            .await
            .context("Failed to cache scan embedding")?;

        Ok(())
    }

    async fn insert_matches(&self, scan_id: Uuid, matches: &[MatchRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        for m in matches {
            sqlx::query(
                r#"
                INSERT INTO scan_matches
                    (id, scan_id, title, owner_name, country, source_kind,
                     legal_status, snippet, source_url, similarity_score)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(scan_id)
            .bind(&m.title)
            .bind(&m.owner)
            .bind(&m.country)
            .bind(m.kind.as_str())
            .bind(&m.legal_status)
            .bind(&m.snippet)
            .bind(&m.source_url)
            .bind(m.similarity_score)
            .execute(&mut *tx)
            .await
            .context("Failed to insert match row")?;
        }

        tx.commit().await.context("Failed to commit match batch")?;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: ScanStatus) -> Result<()> {
        sqlx::query("UPDATE scans SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to update scan status")?;

        Ok(())
    }
}
