use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use vigia_core::domain::agent::{
    Agent, AgentId, AutonomyLevel, CapabilitySet, GuardrailPolicy, TenantId,
};
use vigia_core::store::{AgentStore, StoreError};

use super::{backend_error, decode_error};
use crate::DbPool;

pub struct SqlAgentStore {
    pool: DbPool,
}

impl SqlAgentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const AGENT_COLUMNS: &str = "id, tenant_id, name, autonomy_level, capabilities, guardrails,
                             active, created_at";

fn row_to_agent(row: &SqliteRow) -> Result<Agent, StoreError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let tenant_id: Option<String> = row.try_get("tenant_id").map_err(decode_error)?;
    let name: String = row.try_get("name").map_err(decode_error)?;
    let autonomy_level: Option<String> = row.try_get("autonomy_level").map_err(decode_error)?;
    let capabilities: Option<String> = row.try_get("capabilities").map_err(decode_error)?;
    let guardrails: Option<String> = row.try_get("guardrails").map_err(decode_error)?;
    let active: i64 = row.try_get("active").map_err(decode_error)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode_error)?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Agent {
        id: AgentId(id),
        tenant_id: tenant_id.map(TenantId),
        name,
        autonomy_level: AutonomyLevel::resolve(autonomy_level.as_deref()),
        capabilities: CapabilitySet::decode(capabilities.as_deref()),
        guardrails: GuardrailPolicy::decode(guardrails.as_deref()),
        active: active != 0,
        created_at,
    })
}

#[async_trait]
impl AgentStore for SqlAgentStore {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {AGENT_COLUMNS} FROM autonomous_agent WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        match row {
            Some(ref row) => Ok(Some(row_to_agent(row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, agent: Agent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO autonomous_agent (
                id, tenant_id, name, autonomy_level, capabilities, guardrails,
                active, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                name = excluded.name,
                autonomy_level = excluded.autonomy_level,
                capabilities = excluded.capabilities,
                guardrails = excluded.guardrails,
                active = excluded.active",
        )
        .bind(&agent.id.0)
        .bind(agent.tenant_id.as_ref().map(|tenant| tenant.0.as_str()))
        .bind(&agent.name)
        .bind(agent.autonomy_level.as_str())
        .bind(agent.capabilities.encode())
        .bind(agent.guardrails.encode())
        .bind(i64::from(agent.active))
        .bind(agent.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }

    async fn list_active(&self, limit: u32) -> Result<Vec<Agent>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {AGENT_COLUMNS} FROM autonomous_agent
             WHERE active = 1
             ORDER BY created_at ASC
             LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.iter().map(row_to_agent).collect()
    }
}
