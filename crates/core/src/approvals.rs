use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::agent::AgentId;
use crate::domain::approval::{ApprovalId, ApprovalPriority};
use crate::domain::execution::ExecutionId;

/// A gated action handed off to the human approval queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSubmission {
    pub execution_id: ExecutionId,
    pub agent_id: AgentId,
    pub summary: String,
    pub reason: String,
    pub priority: ApprovalPriority,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalTicket {
    pub approval_id: ApprovalId,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalGatewayError {
    #[error("approval gateway rejected the request: {0}")]
    Rejected(String),
    #[error("approval gateway unavailable: {0}")]
    Unavailable(String),
}

/// Receives approval requests for gated actions; resolution happens out of
/// band and comes back through the orchestrator.
#[async_trait]
pub trait ApprovalGateway: Send + Sync {
    async fn request_approval(
        &self,
        submission: ApprovalSubmission,
    ) -> Result<ApprovalTicket, ApprovalGatewayError>;
}

/// Gateway fake that records submissions and hands out sequential ids.
#[derive(Clone, Default)]
pub struct RecordingApprovalGateway {
    submissions: Arc<Mutex<Vec<ApprovalSubmission>>>,
}

impl RecordingApprovalGateway {
    pub fn submissions(&self) -> Vec<ApprovalSubmission> {
        match self.submissions.lock() {
            Ok(submissions) => submissions.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ApprovalGateway for RecordingApprovalGateway {
    async fn request_approval(
        &self,
        submission: ApprovalSubmission,
    ) -> Result<ApprovalTicket, ApprovalGatewayError> {
        let sequence = match self.submissions.lock() {
            Ok(mut submissions) => {
                submissions.push(submission);
                submissions.len()
            }
            Err(poisoned) => {
                let mut submissions = poisoned.into_inner();
                submissions.push(submission);
                submissions.len()
            }
        };

        Ok(ApprovalTicket { approval_id: ApprovalId(format!("APR-{sequence}")) })
    }
}
