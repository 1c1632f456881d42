use async_trait::async_trait;
use thiserror::Error;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::approval::{ApprovalId, ApprovalRequest};
use crate::domain::execution::{Execution, ExecutionId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, StoreError>;

    async fn save(&self, agent: Agent) -> Result<(), StoreError>;

    /// Active agents, oldest-first, bounded by `limit`.
    async fn list_active(&self, limit: u32) -> Result<Vec<Agent>, StoreError>;
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn find_by_id(&self, id: &ExecutionId) -> Result<Option<Execution>, StoreError>;

    async fn save(&self, execution: Execution) -> Result<(), StoreError>;

    /// Executions in a non-terminal status, newest-first, bounded by
    /// `limit`.
    async fn list_active(&self, limit: u32) -> Result<Vec<Execution>, StoreError>;
}

#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn find_by_id(&self, id: &ApprovalId) -> Result<Option<ApprovalRequest>, StoreError>;

    async fn save(&self, approval: ApprovalRequest) -> Result<(), StoreError>;

    /// Pending approval requests, newest-first, bounded by `limit`.
    async fn list_pending(&self, limit: u32) -> Result<Vec<ApprovalRequest>, StoreError>;
}
