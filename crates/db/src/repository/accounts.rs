//! Sender-account store backed by the `connected_accounts` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use engine::models::ConnectedAccount;
use engine::stores::{AccountStore, StoreError};

use crate::models::ConnectedAccountRow;
use crate::store::{store_err, PgStore};

#[async_trait]
impl AccountStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<Option<ConnectedAccount>, StoreError> {
        let row = sqlx::query_as::<_, ConnectedAccountRow>(
            "SELECT * FROM connected_accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(ConnectedAccount::from))
    }

    async fn set_connection_block(&self, id: Uuid, until: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE connected_accounts SET
                metadata = jsonb_set(
                    COALESCE(metadata, '{}'::jsonb),
                    '{connection_request_blocked_until}',
                    to_jsonb($2::text)
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(until.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
