use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use vigia_core::domain::agent::AgentId;
use vigia_core::domain::approval::{ApprovalId, ApprovalPriority, ApprovalRequest, ApprovalStatus};
use vigia_core::domain::execution::ExecutionId;
use vigia_core::store::{ApprovalStore, StoreError};

use super::{backend_error, decode_error};
use crate::DbPool;

pub struct SqlApprovalStore {
    pool: DbPool,
}

impl SqlApprovalStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const APPROVAL_COLUMNS: &str = "id, execution_id, agent_id, summary, reason, priority, status,
                                reviewer, notes, created_at, resolved_at";

fn row_to_approval(row: &SqliteRow) -> Result<ApprovalRequest, StoreError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let execution_id: String = row.try_get("execution_id").map_err(decode_error)?;
    let agent_id: String = row.try_get("agent_id").map_err(decode_error)?;
    let summary: String = row.try_get("summary").map_err(decode_error)?;
    let reason: String = row.try_get("reason").map_err(decode_error)?;
    let priority: String = row.try_get("priority").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let reviewer: Option<String> = row.try_get("reviewer").map_err(decode_error)?;
    let notes: Option<String> = row.try_get("notes").map_err(decode_error)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode_error)?;
    let resolved_at_str: Option<String> = row.try_get("resolved_at").map_err(decode_error)?;

    let status = ApprovalStatus::parse(&status)
        .ok_or_else(|| StoreError::Decode(format!("unknown approval status `{status}`")))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let resolved_at = resolved_at_str
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(ApprovalRequest {
        id: ApprovalId(id),
        execution_id: ExecutionId(execution_id),
        agent_id: AgentId(agent_id),
        summary,
        reason,
        priority: ApprovalPriority::parse(&priority).unwrap_or_default(),
        status,
        reviewer,
        notes,
        created_at,
        resolved_at,
    })
}

#[async_trait]
impl ApprovalStore for SqlApprovalStore {
    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<ApprovalRequest>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approval_request WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        match row {
            Some(ref row) => Ok(Some(row_to_approval(row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, approval: ApprovalRequest) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO approval_request (
                id, execution_id, agent_id, summary, reason, priority, status,
                reviewer, notes, created_at, resolved_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                reviewer = excluded.reviewer,
                notes = excluded.notes,
                resolved_at = excluded.resolved_at",
        )
        .bind(&approval.id.0)
        .bind(&approval.execution_id.0)
        .bind(&approval.agent_id.0)
        .bind(&approval.summary)
        .bind(&approval.reason)
        .bind(approval.priority.as_str())
        .bind(approval.status.as_str())
        .bind(approval.reviewer.as_deref())
        .bind(approval.notes.as_deref())
        .bind(approval.created_at.to_rfc3339())
        .bind(approval.resolved_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }

    async fn list_pending(&self, limit: u32) -> Result<Vec<ApprovalRequest>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approval_request
             WHERE status = 'pending'
             ORDER BY created_at DESC
             LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.iter().map(row_to_approval).collect()
    }
}
