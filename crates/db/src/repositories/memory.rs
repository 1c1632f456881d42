use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use vigia_core::domain::agent::{Agent, AgentId};
use vigia_core::domain::approval::{ApprovalId, ApprovalRequest, ApprovalStatus};
use vigia_core::domain::execution::{Execution, ExecutionId};
use vigia_core::store::{AgentStore, ApprovalStore, ExecutionStore, StoreError};

#[derive(Default)]
pub struct InMemoryAgentStore {
    agents: RwLock<HashMap<String, Agent>>,
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, StoreError> {
        let agents = self.agents.read().await;
        Ok(agents.get(&id.0).cloned())
    }

    async fn save(&self, agent: Agent) -> Result<(), StoreError> {
        let mut agents = self.agents.write().await;
        agents.insert(agent.id.0.clone(), agent);
        Ok(())
    }

    async fn list_active(&self, limit: u32) -> Result<Vec<Agent>, StoreError> {
        let agents = self.agents.read().await;
        let mut active: Vec<Agent> =
            agents.values().filter(|agent| agent.active).cloned().collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        active.truncate(limit as usize);
        Ok(active)
    }
}

#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<String, Execution>>,
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn find_by_id(&self, id: &ExecutionId) -> Result<Option<Execution>, StoreError> {
        let executions = self.executions.read().await;
        Ok(executions.get(&id.0).cloned())
    }

    async fn save(&self, execution: Execution) -> Result<(), StoreError> {
        let mut executions = self.executions.write().await;
        executions.insert(execution.id.0.clone(), execution);
        Ok(())
    }

    async fn list_active(&self, limit: u32) -> Result<Vec<Execution>, StoreError> {
        let executions = self.executions.read().await;
        let mut active: Vec<Execution> = executions
            .values()
            .filter(|execution| !execution.status.is_terminal())
            .cloned()
            .collect();
        active.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        active.truncate(limit as usize);
        Ok(active)
    }
}

#[derive(Default)]
pub struct InMemoryApprovalStore {
    approvals: RwLock<HashMap<String, ApprovalRequest>>,
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<ApprovalRequest>, StoreError> {
        let approvals = self.approvals.read().await;
        Ok(approvals.get(&id.0).cloned())
    }

    async fn save(&self, approval: ApprovalRequest) -> Result<(), StoreError> {
        let mut approvals = self.approvals.write().await;
        approvals.insert(approval.id.0.clone(), approval);
        Ok(())
    }

    async fn list_pending(&self, limit: u32) -> Result<Vec<ApprovalRequest>, StoreError> {
        let approvals = self.approvals.read().await;
        let mut pending: Vec<ApprovalRequest> = approvals
            .values()
            .filter(|approval| approval.status == ApprovalStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pending.truncate(limit as usize);
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use vigia_core::domain::agent::{
        Agent, AgentId, AutonomyLevel, CapabilitySet, GuardrailPolicy,
    };
    use vigia_core::domain::execution::{
        ActionLog, Execution, ExecutionId, ExecutionStatus, TriggerType,
    };
    use vigia_core::store::{AgentStore, ExecutionStore};

    use super::{InMemoryAgentStore, InMemoryExecutionStore};

    fn sample_agent(id: &str, active: bool, age_minutes: i64) -> Agent {
        Agent {
            id: AgentId(id.to_string()),
            tenant_id: None,
            name: format!("{id}_agent"),
            autonomy_level: AutonomyLevel::L1,
            capabilities: CapabilitySet::Unrestricted,
            guardrails: GuardrailPolicy::default(),
            active,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    fn sample_execution(id: &str, status: ExecutionStatus, age_minutes: i64) -> Execution {
        Execution {
            id: ExecutionId(id.to_string()),
            agent_id: AgentId("agent-1".to_string()),
            tenant_id: None,
            trigger_type: TriggerType::UserRequest,
            trigger_context: json!({}),
            status,
            started_at: Utc::now() - Duration::minutes(age_minutes),
            actions_taken: ActionLog::default(),
            tokens_used: 0,
            cost: 0.0,
        }
    }

    #[tokio::test]
    async fn in_memory_agent_store_round_trip() {
        let store = InMemoryAgentStore::default();
        let agent = sample_agent("agent-1", true, 0);

        store.save(agent.clone()).await.expect("save agent");
        let found = store.find_by_id(&agent.id).await.expect("find agent");

        assert_eq!(found, Some(agent));
    }

    #[tokio::test]
    async fn in_memory_agent_listing_is_oldest_first() {
        let store = InMemoryAgentStore::default();
        store.save(sample_agent("newer", true, 5)).await.expect("save");
        store.save(sample_agent("older", true, 50)).await.expect("save");
        store.save(sample_agent("hidden", false, 1)).await.expect("save");

        let active = store.list_active(10).await.expect("list");
        let ids: Vec<&str> = active.iter().map(|agent| agent.id.0.as_str()).collect();
        assert_eq!(ids, ["older", "newer"]);
    }

    #[tokio::test]
    async fn in_memory_execution_listing_is_newest_first_without_terminal() {
        let store = InMemoryExecutionStore::default();
        store.save(sample_execution("old", ExecutionStatus::Running, 60)).await.expect("save");
        store.save(sample_execution("new", ExecutionStatus::Paused, 1)).await.expect("save");
        store.save(sample_execution("done", ExecutionStatus::Completed, 2)).await.expect("save");

        let active = store.list_active(10).await.expect("list");
        let ids: Vec<&str> = active.iter().map(|execution| execution.id.0.as_str()).collect();
        assert_eq!(ids, ["new", "old"]);
    }
}
