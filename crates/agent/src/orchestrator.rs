use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use vigia_core::approvals::{ApprovalGateway, ApprovalGatewayError, ApprovalSubmission};
use vigia_core::domain::agent::{AgentId, TenantId};
use vigia_core::domain::approval::{ApprovalId, ApprovalPriority, ApprovalRequest, ApprovalStatus};
use vigia_core::domain::execution::{
    ActionLog, Execution, ExecutionId, ExecutionStatus, TriggerType,
};
use vigia_core::guardrails::{BudgetViolation, EnforcementResult, GuardrailsEnforcer};
use vigia_core::lifecycle::{transition, ExecutionEvent, TransitionError};
use vigia_core::metrics::{ExecutionMetrics, MetricsSink};
use vigia_core::store::{AgentStore, ApprovalStore, ExecutionStore, StoreError};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum OrchestratorError {
    #[error("agent `{0}` not found")]
    AgentNotFound(AgentId),
    #[error("execution `{0}` not found")]
    ExecutionNotFound(ExecutionId),
    #[error("approval `{0}` not found")]
    ApprovalNotFound(ApprovalId),
    #[error("approval `{approval_id}` was already resolved as {status:?}")]
    ApprovalAlreadyResolved { approval_id: ApprovalId, status: ApprovalStatus },
    #[error("execution blocked by guardrails: {}", violations_summary(.0))]
    PolicyViolation(Vec<BudgetViolation>),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("approval gateway failure: {0}")]
    ApprovalGateway(#[from] ApprovalGatewayError),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

fn violations_summary(violations: &[BudgetViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStarted {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    pub approval_id: Option<ApprovalId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub execution_id: ExecutionId,
    pub previous_status: ExecutionStatus,
    pub status: ExecutionStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub execution_id: ExecutionId,
    pub agent_id: AgentId,
    pub status: ExecutionStatus,
    pub trigger_type: TriggerType,
    pub started_at: DateTime<Utc>,
    pub actions_taken: Vec<String>,
    pub tokens_used: u64,
    pub cost: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: ExecutionId,
    pub agent_id: AgentId,
    pub tenant_id: Option<TenantId>,
    pub status: ExecutionStatus,
    pub trigger_type: TriggerType,
    pub started_at: DateTime<Utc>,
    pub tokens_used: u64,
    pub cost: f64,
}

impl ExecutionSummary {
    fn from_execution(execution: Execution) -> Self {
        Self {
            execution_id: execution.id,
            agent_id: execution.agent_id,
            tenant_id: execution.tenant_id,
            status: execution.status,
            trigger_type: execution.trigger_type,
            started_at: execution.started_at,
            tokens_used: execution.tokens_used,
            cost: execution.cost,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

/// Top-level coordinator of agent executions. The only component that
/// mutates execution state; every public method recovers lower-layer
/// faults into a typed result.
pub struct AgentOrchestrator {
    agents: Arc<dyn AgentStore>,
    executions: Arc<dyn ExecutionStore>,
    approvals: Arc<dyn ApprovalStore>,
    gateway: Arc<dyn ApprovalGateway>,
    metrics: Arc<dyn MetricsSink>,
    enforcer: GuardrailsEnforcer,
}

impl AgentOrchestrator {
    pub fn new(
        agents: Arc<dyn AgentStore>,
        executions: Arc<dyn ExecutionStore>,
        approvals: Arc<dyn ApprovalStore>,
        gateway: Arc<dyn ApprovalGateway>,
        metrics: Arc<dyn MetricsSink>,
        enforcer: GuardrailsEnforcer,
    ) -> Self {
        Self { agents, executions, approvals, gateway, metrics, enforcer }
    }

    /// Starts an execution for `agent_id`.
    ///
    /// L0 and L1 agents start straight into `running`; the approval gateway
    /// is never consulted for them. For L2 and above, the trigger is checked
    /// against the agent's approval list and a gated execution is parked in
    /// `awaiting_approval` with a pending approval ticket.
    pub async fn execute(
        &self,
        agent_id: &AgentId,
        trigger: TriggerType,
        context: serde_json::Value,
    ) -> Result<ExecutionStarted, OrchestratorError> {
        let agent = self
            .agents
            .find_by_id(agent_id)
            .await?
            .ok_or_else(|| OrchestratorError::AgentNotFound(agent_id.clone()))?;

        let preflight = self.enforcer.enforce_agent_policy(&agent);
        if !preflight.passed {
            tracing::warn!(
                agent_id = %agent.id,
                violations = violations_summary(&preflight.violations),
                "guardrails blocked execution start"
            );
            return Err(OrchestratorError::PolicyViolation(preflight.violations));
        }

        let execution = Execution {
            id: ExecutionId(Uuid::new_v4().to_string()),
            agent_id: agent.id.clone(),
            tenant_id: agent.tenant_id.clone(),
            trigger_type: trigger,
            trigger_context: context,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            actions_taken: ActionLog::default(),
            tokens_used: 0,
            cost: 0.0,
        };
        self.executions.save(execution.clone()).await?;

        self.metrics.record(&execution.id, ExecutionMetrics::at_start());

        let level = self.enforcer.level(&agent);
        if !level.gated() {
            tracing::info!(
                execution_id = %execution.id,
                agent_id = %agent.id,
                trigger = trigger.as_str(),
                level = level.as_str(),
                "execution started"
            );
            return Ok(ExecutionStarted {
                execution_id: execution.id,
                status: ExecutionStatus::Running,
                approval_id: None,
            });
        }

        let check = self.enforcer.check(&agent, trigger.as_str());
        if check.requires_approval {
            let ticket = self
                .gateway
                .request_approval(ApprovalSubmission {
                    execution_id: execution.id.clone(),
                    agent_id: agent.id.clone(),
                    summary: format!(
                        "automatic execution of agent `{}` triggered by {}",
                        agent.name,
                        trigger.as_str()
                    ),
                    reason: check.reason.clone(),
                    priority: ApprovalPriority::Medium,
                })
                .await?;

            let mut gated = execution;
            gated.status = transition(&gated.status, &ExecutionEvent::RequestApproval)?;
            self.executions.save(gated.clone()).await?;

            tracing::info!(
                execution_id = %gated.id,
                agent_id = %agent.id,
                approval_id = %ticket.approval_id,
                "execution awaiting human approval"
            );
            return Ok(ExecutionStarted {
                execution_id: gated.id,
                status: ExecutionStatus::AwaitingApproval,
                approval_id: Some(ticket.approval_id),
            });
        }

        tracing::info!(
            execution_id = %execution.id,
            agent_id = %agent.id,
            trigger = trigger.as_str(),
            level = level.as_str(),
            "execution started"
        );
        Ok(ExecutionStarted {
            execution_id: execution.id,
            status: ExecutionStatus::Running,
            approval_id: None,
        })
    }

    pub async fn pause(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<TransitionOutcome, OrchestratorError> {
        self.apply_event(execution_id, ExecutionEvent::Pause).await
    }

    pub async fn resume(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<TransitionOutcome, OrchestratorError> {
        self.apply_event(execution_id, ExecutionEvent::Resume).await
    }

    pub async fn cancel(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<TransitionOutcome, OrchestratorError> {
        self.apply_event(execution_id, ExecutionEvent::Cancel).await
    }

    pub async fn complete(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<TransitionOutcome, OrchestratorError> {
        self.apply_event(execution_id, ExecutionEvent::Complete).await
    }

    pub async fn fail(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<TransitionOutcome, OrchestratorError> {
        self.apply_event(execution_id, ExecutionEvent::Fail).await
    }

    /// Snapshot of one execution. A malformed persisted action list decodes
    /// to an empty one rather than failing the call.
    pub async fn status(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<ExecutionSnapshot, OrchestratorError> {
        let execution = self
            .executions
            .find_by_id(execution_id)
            .await?
            .ok_or_else(|| OrchestratorError::ExecutionNotFound(execution_id.clone()))?;

        Ok(ExecutionSnapshot {
            execution_id: execution.id,
            agent_id: execution.agent_id,
            status: execution.status,
            trigger_type: execution.trigger_type,
            started_at: execution.started_at,
            actions_taken: execution.actions_taken.names().to_vec(),
            tokens_used: execution.tokens_used,
            cost: execution.cost,
        })
    }

    /// Non-terminal executions, newest-first. Best-effort: a storage fault
    /// yields an empty list, never an error.
    pub async fn active_executions(&self, limit: u32) -> Vec<ExecutionSummary> {
        match self.executions.list_active(limit).await {
            Ok(executions) => {
                executions.into_iter().map(ExecutionSummary::from_execution).collect()
            }
            Err(error) => {
                tracing::warn!(error = %error, "active execution listing is unavailable");
                Vec::new()
            }
        }
    }

    /// Pending approval tickets, newest-first. Best-effort like
    /// `active_executions`.
    pub async fn pending_approvals(&self, limit: u32) -> Vec<ApprovalRequest> {
        match self.approvals.list_pending(limit).await {
            Ok(approvals) => approvals,
            Err(error) => {
                tracing::warn!(error = %error, "pending approval listing is unavailable");
                Vec::new()
            }
        }
    }

    /// Compares an execution's cumulative counters against its agent's
    /// budgets. Fails closed: an inability to inspect is reported as a
    /// violation, never as a pass.
    pub async fn enforce_budgets(&self, execution_id: &ExecutionId) -> EnforcementResult {
        let execution = match self.executions.find_by_id(execution_id).await {
            Ok(Some(execution)) => execution,
            Ok(None) => {
                return EnforcementResult::fail_closed(BudgetViolation::InspectionFailed(
                    format!("execution `{execution_id}` not found"),
                ))
            }
            Err(error) => {
                return EnforcementResult::fail_closed(BudgetViolation::InspectionFailed(
                    error.to_string(),
                ))
            }
        };

        let agent = match self.agents.find_by_id(&execution.agent_id).await {
            Ok(Some(agent)) => agent,
            Ok(None) => {
                return EnforcementResult::fail_closed(BudgetViolation::AgentUnavailable {
                    agent_id: execution.agent_id.0.clone(),
                })
            }
            Err(error) => {
                return EnforcementResult::fail_closed(BudgetViolation::InspectionFailed(
                    error.to_string(),
                ))
            }
        };

        self.enforcer.enforce_execution_budgets(&agent, &execution)
    }

    /// Applies a reviewer's decision to a pending approval: approval resumes
    /// the gated execution, rejection cancels it.
    pub async fn resolve_approval(
        &self,
        approval_id: &ApprovalId,
        decision: ApprovalDecision,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<TransitionOutcome, OrchestratorError> {
        let mut approval = self
            .approvals
            .find_by_id(approval_id)
            .await?
            .ok_or_else(|| OrchestratorError::ApprovalNotFound(approval_id.clone()))?;

        if approval.status != ApprovalStatus::Pending {
            return Err(OrchestratorError::ApprovalAlreadyResolved {
                approval_id: approval_id.clone(),
                status: approval.status,
            });
        }

        let event = match decision {
            ApprovalDecision::Approve => ExecutionEvent::Resume,
            ApprovalDecision::Reject => ExecutionEvent::Cancel,
        };
        let outcome = self.apply_event(&approval.execution_id, event).await?;

        approval.status = match decision {
            ApprovalDecision::Approve => ApprovalStatus::Approved,
            ApprovalDecision::Reject => ApprovalStatus::Rejected,
        };
        approval.reviewer = Some(reviewer.to_string());
        approval.notes = notes;
        approval.resolved_at = Some(Utc::now());
        self.approvals.save(approval).await?;

        tracing::info!(
            approval_id = %approval_id,
            execution_id = %outcome.execution_id,
            status = outcome.status.as_str(),
            "approval resolved"
        );
        Ok(outcome)
    }

    async fn apply_event(
        &self,
        execution_id: &ExecutionId,
        event: ExecutionEvent,
    ) -> Result<TransitionOutcome, OrchestratorError> {
        let mut execution = self
            .executions
            .find_by_id(execution_id)
            .await?
            .ok_or_else(|| OrchestratorError::ExecutionNotFound(execution_id.clone()))?;

        let previous_status = execution.status;
        execution.status = transition(&previous_status, &event)?;
        let status = execution.status;
        self.executions.save(execution).await?;

        tracing::info!(
            execution_id = %execution_id,
            from = previous_status.as_str(),
            to = status.as_str(),
            event = event.as_str(),
            "execution status updated"
        );
        Ok(TransitionOutcome { execution_id: execution_id.clone(), previous_status, status })
    }
}
