//! Lead store backed by the `leads` table.

use async_trait::async_trait;
use uuid::Uuid;

use engine::models::{Lead, LeadEnrichment, NewLead};
use engine::stores::{LeadStore, StoreError};

use crate::models::LeadRow;
use crate::store::{store_err, PgStore};

#[async_trait]
impl LeadStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<Option<Lead>, StoreError> {
        let row = sqlx::query_as::<_, LeadRow>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.map(Lead::from))
    }

    async fn list_by_campaign(&self, campaign_id: Uuid) -> Result<Vec<Lead>, StoreError> {
        let rows = sqlx::query_as::<_, LeadRow>(
            "SELECT * FROM leads WHERE campaign_id = $1 ORDER BY created_at ASC",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(Lead::from).collect())
    }

    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let row = sqlx::query_as::<_, LeadRow>(
            r#"
            INSERT INTO leads
                (id, organization_id, campaign_id, linkedin_url, public_identifier,
                 first_name, last_name, title, company, email, phone, location,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(lead.organization_id)
        .bind(lead.campaign_id)
        .bind(lead.linkedin_url)
        .bind(lead.public_identifier)
        .bind(lead.first_name)
        .bind(lead.last_name)
        .bind(lead.title)
        .bind(lead.company)
        .bind(lead.email)
        .bind(lead.phone)
        .bind(lead.location)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.into())
    }

    async fn update_enrichment(
        &self,
        id: Uuid,
        enrichment: &LeadEnrichment,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE leads SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                title = COALESCE($4, title),
                company = COALESCE($5, company),
                email = COALESCE($6, email),
                phone = COALESCE($7, phone),
                location = COALESCE($8, location),
                provider_id = COALESCE($9, provider_id),
                public_identifier = COALESCE($10, public_identifier),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&enrichment.first_name)
        .bind(&enrichment.last_name)
        .bind(&enrichment.title)
        .bind(&enrichment.company)
        .bind(&enrichment.email)
        .bind(&enrichment.phone)
        .bind(&enrichment.location)
        .bind(&enrichment.provider_id)
        .bind(&enrichment.public_identifier)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_by_provider_id(&self, provider_id: &str) -> Result<Vec<Lead>, StoreError> {
        let rows = sqlx::query_as::<_, LeadRow>("SELECT * FROM leads WHERE provider_id = $1")
            .bind(provider_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Lead::from).collect())
    }
}
