use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use vigia_core::approvals::{
    ApprovalGateway, ApprovalGatewayError, ApprovalSubmission, ApprovalTicket,
};
use vigia_core::domain::approval::{ApprovalId, ApprovalRequest, ApprovalStatus};
use vigia_core::store::ApprovalStore;

/// Gateway that parks approval requests in the approval store, where
/// reviewers pick them up and the orchestrator later applies the
/// resolution.
pub struct StoredApprovalGateway {
    approvals: Arc<dyn ApprovalStore>,
}

impl StoredApprovalGateway {
    pub fn new(approvals: Arc<dyn ApprovalStore>) -> Self {
        Self { approvals }
    }
}

#[async_trait]
impl ApprovalGateway for StoredApprovalGateway {
    async fn request_approval(
        &self,
        submission: ApprovalSubmission,
    ) -> Result<ApprovalTicket, ApprovalGatewayError> {
        let approval = ApprovalRequest {
            id: ApprovalId(Uuid::new_v4().to_string()),
            execution_id: submission.execution_id,
            agent_id: submission.agent_id,
            summary: submission.summary,
            reason: submission.reason,
            priority: submission.priority,
            status: ApprovalStatus::Pending,
            reviewer: None,
            notes: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        let approval_id = approval.id.clone();

        self.approvals
            .save(approval)
            .await
            .map_err(|error| ApprovalGatewayError::Unavailable(error.to_string()))?;

        tracing::debug!(approval_id = %approval_id, "approval request parked for review");
        Ok(ApprovalTicket { approval_id })
    }
}
