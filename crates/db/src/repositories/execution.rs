use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use vigia_core::domain::agent::{AgentId, TenantId};
use vigia_core::domain::execution::{
    ActionLog, Execution, ExecutionId, ExecutionStatus, TriggerType,
};
use vigia_core::store::{ExecutionStore, StoreError};

use super::{backend_error, decode_error};
use crate::DbPool;

pub struct SqlExecutionStore {
    pool: DbPool,
}

impl SqlExecutionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const EXECUTION_COLUMNS: &str = "id, agent_id, tenant_id, trigger_type, trigger_context, status,
                                 started_at, actions_taken, tokens_used, cost";

fn row_to_execution(row: &SqliteRow) -> Result<Execution, StoreError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let agent_id: String = row.try_get("agent_id").map_err(decode_error)?;
    let tenant_id: Option<String> = row.try_get("tenant_id").map_err(decode_error)?;
    let trigger_type: Option<String> = row.try_get("trigger_type").map_err(decode_error)?;
    let trigger_context: String = row.try_get("trigger_context").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let started_at_str: String = row.try_get("started_at").map_err(decode_error)?;
    let actions_taken: String = row.try_get("actions_taken").map_err(decode_error)?;
    let tokens_used: i64 = row.try_get("tokens_used").map_err(decode_error)?;
    let cost: f64 = row.try_get("cost").map_err(decode_error)?;

    let status = ExecutionStatus::parse(&status)
        .ok_or_else(|| StoreError::Decode(format!("unknown execution status `{status}`")))?;

    let started_at = DateTime::parse_from_rfc3339(&started_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Execution {
        id: ExecutionId(id),
        agent_id: AgentId(agent_id),
        tenant_id: tenant_id.map(TenantId),
        trigger_type: TriggerType::resolve(trigger_type.as_deref()),
        trigger_context: serde_json::from_str(&trigger_context)
            .unwrap_or_else(|_| serde_json::json!({})),
        status,
        started_at,
        actions_taken: ActionLog::decode(&actions_taken),
        tokens_used: tokens_used.max(0) as u64,
        cost,
    })
}

#[async_trait]
impl ExecutionStore for SqlExecutionStore {
    async fn find_by_id(&self, id: &ExecutionId) -> Result<Option<Execution>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM agent_execution WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        match row {
            Some(ref row) => Ok(Some(row_to_execution(row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, execution: Execution) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO agent_execution (
                id, agent_id, tenant_id, trigger_type, trigger_context, status,
                started_at, actions_taken, tokens_used, cost
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                actions_taken = excluded.actions_taken,
                tokens_used = excluded.tokens_used,
                cost = excluded.cost",
        )
        .bind(&execution.id.0)
        .bind(&execution.agent_id.0)
        .bind(execution.tenant_id.as_ref().map(|tenant| tenant.0.as_str()))
        .bind(execution.trigger_type.as_str())
        .bind(execution.trigger_context.to_string())
        .bind(execution.status.as_str())
        .bind(execution.started_at.to_rfc3339())
        .bind(execution.actions_taken.encode())
        .bind(execution.tokens_used as i64)
        .bind(execution.cost)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }

    async fn list_active(&self, limit: u32) -> Result<Vec<Execution>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM agent_execution
             WHERE status IN ('running', 'paused', 'awaiting_approval')
             ORDER BY started_at DESC
             LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.iter().map(row_to_execution).collect()
    }
}
