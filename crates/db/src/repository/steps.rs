//! Workflow-step store backed by the `workflow_steps` table — the
//! scheduler's ledger.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use engine::models::{NewStep, WorkflowStep, CAMPAIGN_WORKFLOW};
use engine::stores::{StepStore, StoreError};
use engine::workflow::StepKind;

use crate::models::WorkflowStepRow;
use crate::store::{decode_err, store_err, PgStore};

fn into_step(row: WorkflowStepRow) -> Result<WorkflowStep, StoreError> {
    WorkflowStep::try_from(row).map_err(decode_err)
}

fn into_steps(rows: Vec<WorkflowStepRow>) -> Result<Vec<WorkflowStep>, StoreError> {
    rows.into_iter().map(into_step).collect()
}

#[async_trait]
impl StepStore for PgStore {
    async fn insert(&self, step: NewStep) -> Result<WorkflowStep, StoreError> {
        let row = sqlx::query_as::<_, WorkflowStepRow>(
            r#"
            INSERT INTO workflow_steps
                (id, organization_id, lead_id, id_in_workflow, step_index,
                 workflow_type, step_type, status, retries, execute_after,
                 raw_response, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $10, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(step.organization_id)
        .bind(step.lead_id)
        .bind(step.id_in_workflow)
        .bind(step.step_index)
        .bind(CAMPAIGN_WORKFLOW)
        .bind(step.step_type.to_string())
        .bind(step.retries)
        .bind(step.execute_after)
        .bind(step.raw_response)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        into_step(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<WorkflowStep>, StoreError> {
        let row =
            sqlx::query_as::<_, WorkflowStepRow>("SELECT * FROM workflow_steps WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;
        row.map(into_step).transpose()
    }

    async fn list_due_pending(&self, now_secs: i64) -> Result<Vec<WorkflowStep>, StoreError> {
        let rows = sqlx::query_as::<_, WorkflowStepRow>(
            r#"
            SELECT * FROM workflow_steps
            WHERE workflow_type = $1 AND status = 'pending' AND execute_after <= $2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(CAMPAIGN_WORKFLOW)
        .bind(now_secs)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        into_steps(rows)
    }

    async fn list_for_leads(&self, lead_ids: &[Uuid]) -> Result<Vec<WorkflowStep>, StoreError> {
        let rows = sqlx::query_as::<_, WorkflowStepRow>(
            r#"
            SELECT * FROM workflow_steps
            WHERE workflow_type = $1 AND lead_id = ANY($2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(CAMPAIGN_WORKFLOW)
        .bind(lead_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        into_steps(rows)
    }

    async fn list_failed_for_leads(
        &self,
        lead_ids: &[Uuid],
    ) -> Result<Vec<WorkflowStep>, StoreError> {
        let rows = sqlx::query_as::<_, WorkflowStepRow>(
            r#"
            SELECT * FROM workflow_steps
            WHERE workflow_type = $1 AND status = 'failed' AND lead_id = ANY($2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(CAMPAIGN_WORKFLOW)
        .bind(lead_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        into_steps(rows)
    }

    async fn list_pending_reply_checks(
        &self,
        lead_id: Uuid,
    ) -> Result<Vec<WorkflowStep>, StoreError> {
        let rows = sqlx::query_as::<_, WorkflowStepRow>(
            r#"
            SELECT * FROM workflow_steps
            WHERE lead_id = $1 AND status = 'pending' AND step_type = $2
            "#,
        )
        .bind(lead_id)
        .bind(StepKind::CheckMessageReply.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        into_steps(rows)
    }

    async fn mark_complete(&self, id: Uuid, raw_response: &Value) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_steps
            SET status = 'complete', raw_response = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(raw_response)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_steps
            SET status = 'failed',
                retries = retries + 1,
                last_try_at = NOW(),
                raw_response = jsonb_build_object('error', $2::text),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn reschedule(&self, id: Uuid, execute_after: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE workflow_steps SET execute_after = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(execute_after)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn re_arm_poll(
        &self,
        id: Uuid,
        execute_after: i64,
        retries: i32,
        raw_response: &Value,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_steps
            SET status = 'pending', execute_after = $2, retries = $3,
                raw_response = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(execute_after)
        .bind(retries)
        .bind(raw_response)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn re_arm_failed(&self, id: Uuid, now_secs: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_steps
            SET status = 'pending', execute_after = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now_secs)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_replied(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_steps
            SET raw_response = jsonb_set(
                    COALESCE(raw_response, '{}'::jsonb),
                    '{hasReplied}',
                    'true'::jsonb
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn defer_connection_requests(
        &self,
        account_id: Uuid,
        execute_after: i64,
    ) -> Result<u64, StoreError> {
        // One bulk write across every campaign sharing the sender.
        // Steps already past the cooldown are left alone, which keeps
        // the operation idempotent.
        let result = sqlx::query(
            r#"
            UPDATE workflow_steps
            SET execute_after = $2, updated_at = NOW()
            WHERE status = 'pending'
              AND step_type = $3
              AND execute_after < $2
              AND lead_id IN (
                  SELECT l.id FROM leads l
                  JOIN campaigns c ON c.id = l.campaign_id
                  WHERE c.connected_account_id = $1
              )
            "#,
        )
        .bind(account_id)
        .bind(execute_after)
        .bind(StepKind::SendConnectionRequest.to_string())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected())
    }
}
