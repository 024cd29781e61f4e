//! Campaign store backed by the `campaigns` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use engine::models::{Campaign, CampaignStatus};
use engine::ratelimit::CounterPatch;
use engine::stores::{CampaignStore, StoreError};

use crate::models::CampaignRow;
use crate::store::{decode_err, store_err, PgStore};

fn into_campaign(row: CampaignRow) -> Result<Campaign, StoreError> {
    Campaign::try_from(row).map_err(decode_err)
}

#[async_trait]
impl CampaignStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        let row = sqlx::query_as::<_, CampaignRow>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(into_campaign).transpose()
    }

    async fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        let rows = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT * FROM campaigns
            WHERE is_deleted = FALSE
              AND status IN ('draft', 'scheduled')
              AND start_date IS NOT NULL
              AND start_date <= $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(into_campaign).collect()
    }

    async fn list_in_progress(&self) -> Result<Vec<Campaign>, StoreError> {
        let rows = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT * FROM campaigns
            WHERE is_deleted = FALSE AND status = 'in_progress'
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(into_campaign).collect()
    }

    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE campaigns SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.to_string())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn apply_counters(&self, id: Uuid, patch: &CounterPatch) -> Result<(), StoreError> {
        // Resets and increments arrive merged; COALESCE keeps untouched
        // columns as they are so the whole patch is one write.
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                requests_sent_this_day = COALESCE($2, requests_sent_this_day),
                requests_sent_this_week = COALESCE($3, requests_sent_this_week),
                last_daily_requests_reset = COALESCE($4, last_daily_requests_reset),
                last_weekly_requests_reset = COALESCE($5, last_weekly_requests_reset),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.requests_sent_this_day)
        .bind(patch.requests_sent_this_week)
        .bind(patch.last_daily_requests_reset)
        .bind(patch.last_weekly_requests_reset)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
