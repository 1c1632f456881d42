use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use vigia_agent::{AgentOrchestrator, ApprovalDecision, OrchestratorError, StoredApprovalGateway};
use vigia_core::approvals::RecordingApprovalGateway;
use vigia_core::clock::FixedClock;
use vigia_core::domain::agent::{
    Agent, AgentId, AutonomyLevel, CapabilitySet, GuardrailPolicy,
};
use vigia_core::domain::execution::{
    ActionLog, Execution, ExecutionId, ExecutionStatus, TriggerType,
};
use vigia_core::guardrails::{BudgetViolation, GuardrailSettings, GuardrailsEnforcer};
use vigia_core::metrics::InMemoryMetricsSink;
use vigia_core::store::{AgentStore, ApprovalStore, ExecutionStore};
use vigia_db::{InMemoryAgentStore, InMemoryApprovalStore, InMemoryExecutionStore};

struct Harness {
    orchestrator: AgentOrchestrator,
    agents: Arc<InMemoryAgentStore>,
    executions: Arc<InMemoryExecutionStore>,
    approvals: Arc<InMemoryApprovalStore>,
    gateway: RecordingApprovalGateway,
    metrics: InMemoryMetricsSink,
}

fn enforcer() -> GuardrailsEnforcer {
    GuardrailsEnforcer::new(GuardrailSettings::default(), Arc::new(FixedClock(12)))
}

/// Harness wired with the recording gateway, for asserting whether the
/// approval queue was consulted at all.
fn harness() -> Harness {
    let agents = Arc::new(InMemoryAgentStore::default());
    let executions = Arc::new(InMemoryExecutionStore::default());
    let approvals = Arc::new(InMemoryApprovalStore::default());
    let gateway = RecordingApprovalGateway::default();
    let metrics = InMemoryMetricsSink::default();

    let orchestrator = AgentOrchestrator::new(
        agents.clone(),
        executions.clone(),
        approvals.clone(),
        Arc::new(gateway.clone()),
        Arc::new(metrics.clone()),
        enforcer(),
    );

    Harness { orchestrator, agents, executions, approvals, gateway, metrics }
}

/// Harness wired with the stored gateway, for exercising the full
/// request-then-resolve approval round trip.
fn stored_gateway_harness() -> Harness {
    let agents = Arc::new(InMemoryAgentStore::default());
    let executions = Arc::new(InMemoryExecutionStore::default());
    let approvals = Arc::new(InMemoryApprovalStore::default());
    let metrics = InMemoryMetricsSink::default();

    let orchestrator = AgentOrchestrator::new(
        agents.clone(),
        executions.clone(),
        approvals.clone(),
        Arc::new(StoredApprovalGateway::new(approvals.clone())),
        Arc::new(metrics.clone()),
        enforcer(),
    );

    Harness {
        orchestrator,
        agents,
        executions,
        approvals,
        gateway: RecordingApprovalGateway::default(),
        metrics,
    }
}

fn sample_agent(id: &str, name: &str, level: AutonomyLevel) -> Agent {
    Agent {
        id: AgentId(id.to_string()),
        tenant_id: None,
        name: name.to_string(),
        autonomy_level: level,
        capabilities: CapabilitySet::Unrestricted,
        guardrails: GuardrailPolicy::default(),
        active: true,
        created_at: Utc::now(),
    }
}

fn gated_agent(id: &str) -> Agent {
    let mut agent = sample_agent(id, "enrollment_agent", AutonomyLevel::L2);
    agent.guardrails.requires_approval = ["user_request".to_string()].into_iter().collect();
    agent
}

#[tokio::test]
async fn execute_unknown_agent_reports_the_literal_id() {
    let harness = harness();

    let error = harness
        .orchestrator
        .execute(&AgentId("ghost-agent".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect_err("unknown agent must fail");

    assert!(matches!(error, OrchestratorError::AgentNotFound(_)));
    assert!(error.to_string().contains("ghost-agent"));
}

#[tokio::test]
async fn l1_execution_starts_running_without_consulting_approvals() {
    let harness = harness();
    harness
        .agents
        .save(sample_agent("agent-1", "support_agent", AutonomyLevel::L1))
        .await
        .expect("seed agent");

    let started = harness
        .orchestrator
        .execute(&AgentId("agent-1".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("execution starts");

    assert_eq!(started.status, ExecutionStatus::Running);
    assert!(started.approval_id.is_none());
    assert!(harness.gateway.submissions().is_empty());
}

#[tokio::test]
async fn l0_execution_also_skips_the_approval_gateway() {
    let harness = harness();
    harness
        .agents
        .save(sample_agent("agent-0", "info_agent", AutonomyLevel::L0))
        .await
        .expect("seed agent");

    let started = harness
        .orchestrator
        .execute(&AgentId("agent-0".to_string()), TriggerType::Schedule, json!({}))
        .await
        .expect("execution starts");

    assert_eq!(started.status, ExecutionStatus::Running);
    assert!(harness.gateway.submissions().is_empty());
}

#[tokio::test]
async fn gated_l2_execution_parks_in_awaiting_approval() {
    let harness = harness();
    harness.agents.save(gated_agent("agent-2")).await.expect("seed agent");

    let started = harness
        .orchestrator
        .execute(&AgentId("agent-2".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("execution starts");

    assert_eq!(started.status, ExecutionStatus::AwaitingApproval);
    assert!(started.approval_id.is_some());

    let submissions = harness.gateway.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].execution_id, started.execution_id);

    let stored = harness
        .executions
        .find_by_id(&started.execution_id)
        .await
        .expect("lookup ok")
        .expect("execution persisted");
    assert_eq!(stored.status, ExecutionStatus::AwaitingApproval);
}

#[tokio::test]
async fn l2_execution_without_gated_trigger_runs_directly() {
    let harness = harness();
    let mut agent = sample_agent("agent-2", "enrollment_agent", AutonomyLevel::L2);
    agent.guardrails.requires_approval = ["deploy_code".to_string()].into_iter().collect();
    harness.agents.save(agent).await.expect("seed agent");

    let started = harness
        .orchestrator
        .execute(&AgentId("agent-2".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("execution starts");

    assert_eq!(started.status, ExecutionStatus::Running);
    assert!(started.approval_id.is_none());
    assert!(harness.gateway.submissions().is_empty());
}

#[tokio::test]
async fn metrics_are_recorded_for_every_started_execution() {
    let harness = harness();
    harness
        .agents
        .save(sample_agent("agent-1", "support_agent", AutonomyLevel::L1))
        .await
        .expect("seed agent");
    harness.agents.save(gated_agent("agent-2")).await.expect("seed agent");

    harness
        .orchestrator
        .execute(&AgentId("agent-1".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("plain execution");
    harness
        .orchestrator
        .execute(&AgentId("agent-2".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("gated execution");

    let records = harness.metrics.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|(_, metrics)| metrics.tokens_used == 0));
}

#[tokio::test]
async fn pause_resume_round_trip_returns_to_running() {
    let harness = harness();
    harness
        .agents
        .save(sample_agent("agent-1", "support_agent", AutonomyLevel::L1))
        .await
        .expect("seed agent");

    let started = harness
        .orchestrator
        .execute(&AgentId("agent-1".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("execution starts");

    let paused = harness.orchestrator.pause(&started.execution_id).await.expect("pause");
    assert_eq!(paused.previous_status, ExecutionStatus::Running);
    assert_eq!(paused.status, ExecutionStatus::Paused);

    let resumed = harness.orchestrator.resume(&started.execution_id).await.expect("resume");
    assert_eq!(resumed.status, ExecutionStatus::Running);
}

#[tokio::test]
async fn resume_without_prior_pause_is_an_invalid_transition() {
    let harness = harness();
    harness
        .agents
        .save(sample_agent("agent-1", "support_agent", AutonomyLevel::L1))
        .await
        .expect("seed agent");

    let started = harness
        .orchestrator
        .execute(&AgentId("agent-1".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("execution starts");

    let error = harness
        .orchestrator
        .resume(&started.execution_id)
        .await
        .expect_err("resume on running must fail");
    assert!(matches!(error, OrchestratorError::InvalidTransition(_)));

    // The failed transition must not have mutated the stored status.
    let snapshot = harness.orchestrator.status(&started.execution_id).await.expect("status");
    assert_eq!(snapshot.status, ExecutionStatus::Running);
}

#[tokio::test]
async fn cancel_succeeds_from_running_and_paused_but_not_from_terminal() {
    let harness = harness();
    harness
        .agents
        .save(sample_agent("agent-1", "support_agent", AutonomyLevel::L1))
        .await
        .expect("seed agent");

    let from_running = harness
        .orchestrator
        .execute(&AgentId("agent-1".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("first execution");
    harness.orchestrator.cancel(&from_running.execution_id).await.expect("cancel running");

    let from_paused = harness
        .orchestrator
        .execute(&AgentId("agent-1".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("second execution");
    harness.orchestrator.pause(&from_paused.execution_id).await.expect("pause");
    harness.orchestrator.cancel(&from_paused.execution_id).await.expect("cancel paused");

    let error = harness
        .orchestrator
        .cancel(&from_running.execution_id)
        .await
        .expect_err("cancel on cancelled must fail");
    assert!(matches!(error, OrchestratorError::InvalidTransition(_)));

    let completed = harness
        .orchestrator
        .execute(&AgentId("agent-1".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("third execution");
    harness.orchestrator.complete(&completed.execution_id).await.expect("complete");
    harness
        .orchestrator
        .pause(&completed.execution_id)
        .await
        .expect_err("pause on completed must fail");
}

#[tokio::test]
async fn status_of_unknown_execution_reports_the_literal_id() {
    let harness = harness();

    let error = harness
        .orchestrator
        .status(&ExecutionId("ghost-exec".to_string()))
        .await
        .expect_err("unknown execution must fail");

    assert!(matches!(error, OrchestratorError::ExecutionNotFound(_)));
    assert!(error.to_string().contains("ghost-exec"));
}

#[tokio::test]
async fn active_listing_is_bounded_and_excludes_terminal_executions() {
    let harness = harness();
    harness
        .agents
        .save(sample_agent("agent-1", "support_agent", AutonomyLevel::L1))
        .await
        .expect("seed agent");

    let mut started_ids = Vec::new();
    for _ in 0..4 {
        let started = harness
            .orchestrator
            .execute(&AgentId("agent-1".to_string()), TriggerType::Schedule, json!({}))
            .await
            .expect("execution starts");
        started_ids.push(started.execution_id);
    }
    harness.orchestrator.cancel(&started_ids[0]).await.expect("cancel one");

    let active = harness.orchestrator.active_executions(10).await;
    assert_eq!(active.len(), 3);
    assert!(active.iter().all(|summary| !summary.status.is_terminal()));

    let bounded = harness.orchestrator.active_executions(2).await;
    assert_eq!(bounded.len(), 2);
}

async fn seed_execution_with_counters(
    harness: &Harness,
    id: &str,
    tokens_used: u64,
    actions: usize,
    cost: f64,
) -> ExecutionId {
    let execution = Execution {
        id: ExecutionId(id.to_string()),
        agent_id: AgentId("agent-1".to_string()),
        tenant_id: None,
        trigger_type: TriggerType::UserRequest,
        trigger_context: json!({}),
        status: ExecutionStatus::Running,
        started_at: Utc::now(),
        actions_taken: ActionLog::from_names((0..actions).map(|index| format!("action_{index}"))),
        tokens_used,
        cost,
    };
    harness.executions.save(execution.clone()).await.expect("seed execution");
    execution.id
}

#[tokio::test]
async fn budget_enforcement_reports_every_exceeded_limit() {
    let harness = harness();
    let mut agent = sample_agent("agent-1", "support_agent", AutonomyLevel::L1);
    agent.guardrails.max_tokens = Some(5_000);
    harness.agents.save(agent).await.expect("seed agent");

    let over_tokens = seed_execution_with_counters(&harness, "exec-tokens", 6_000, 0, 0.0).await;
    let result = harness.orchestrator.enforce_budgets(&over_tokens).await;
    assert!(!result.passed);
    assert!(result.violations.iter().any(|violation| violation.to_string().contains("tokens")));

    let at_action_limit = seed_execution_with_counters(&harness, "exec-actions", 0, 100, 0.0).await;
    let result = harness.orchestrator.enforce_budgets(&at_action_limit).await;
    assert!(!result.passed);
    assert!(result
        .violations
        .iter()
        .any(|violation| matches!(violation, BudgetViolation::ActionCountExceeded { .. })));

    let over_cost = seed_execution_with_counters(&harness, "exec-cost", 0, 0, 15.0).await;
    let result = harness.orchestrator.enforce_budgets(&over_cost).await;
    assert!(!result.passed);
    assert!(result.violations.iter().any(|violation| violation.to_string().contains("cost")));

    let over_everything =
        seed_execution_with_counters(&harness, "exec-all", 6_000, 100, 15.0).await;
    let result = harness.orchestrator.enforce_budgets(&over_everything).await;
    assert!(!result.passed);
    assert!(result.violations.len() >= 3);

    let within_limits = seed_execution_with_counters(&harness, "exec-ok", 1_000, 2, 0.5).await;
    let result = harness.orchestrator.enforce_budgets(&within_limits).await;
    assert!(result.passed);
}

#[tokio::test]
async fn budget_enforcement_fails_closed_when_the_agent_is_missing() {
    let harness = harness();
    let orphan = seed_execution_with_counters(&harness, "exec-orphan", 0, 0, 0.0).await;

    let result = harness.orchestrator.enforce_budgets(&orphan).await;

    assert!(!result.passed);
    assert!(result
        .violations
        .iter()
        .any(|violation| matches!(violation, BudgetViolation::AgentUnavailable { .. })));
}

#[tokio::test]
async fn budget_enforcement_fails_closed_for_unknown_executions() {
    let harness = harness();

    let result =
        harness.orchestrator.enforce_budgets(&ExecutionId("ghost-exec".to_string())).await;

    assert!(!result.passed);
    assert!(!result.violations.is_empty());
}

#[tokio::test]
async fn approved_gate_resumes_the_execution() {
    let harness = stored_gateway_harness();
    harness.agents.save(gated_agent("agent-2")).await.expect("seed agent");

    let started = harness
        .orchestrator
        .execute(&AgentId("agent-2".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("gated execution");
    let approval_id = started.approval_id.expect("approval ticket issued");

    let pending = harness.orchestrator.pending_approvals(10).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, approval_id);

    let outcome = harness
        .orchestrator
        .resolve_approval(
            &approval_id,
            ApprovalDecision::Approve,
            "supervisor@example.com",
            Some("within policy".to_string()),
        )
        .await
        .expect("approval resolves");

    assert_eq!(outcome.previous_status, ExecutionStatus::AwaitingApproval);
    assert_eq!(outcome.status, ExecutionStatus::Running);

    let resolved = harness
        .approvals
        .find_by_id(&approval_id)
        .await
        .expect("lookup ok")
        .expect("approval exists");
    assert_eq!(resolved.reviewer.as_deref(), Some("supervisor@example.com"));
    assert!(resolved.resolved_at.is_some());
}

#[tokio::test]
async fn rejected_gate_cancels_the_execution() {
    let harness = stored_gateway_harness();
    harness.agents.save(gated_agent("agent-2")).await.expect("seed agent");

    let started = harness
        .orchestrator
        .execute(&AgentId("agent-2".to_string()), TriggerType::UserRequest, json!({}))
        .await
        .expect("gated execution");
    let approval_id = started.approval_id.expect("approval ticket issued");

    let outcome = harness
        .orchestrator
        .resolve_approval(&approval_id, ApprovalDecision::Reject, "supervisor@example.com", None)
        .await
        .expect("rejection resolves");

    assert_eq!(outcome.status, ExecutionStatus::Cancelled);

    let error = harness
        .orchestrator
        .resolve_approval(&approval_id, ApprovalDecision::Approve, "other@example.com", None)
        .await
        .expect_err("double resolution must fail");
    assert!(matches!(error, OrchestratorError::ApprovalAlreadyResolved { .. }));
}

#[tokio::test]
async fn resolving_an_unknown_approval_reports_the_literal_id() {
    let harness = stored_gateway_harness();

    let error = harness
        .orchestrator
        .resolve_approval(
            &vigia_core::domain::approval::ApprovalId("ghost-approval".to_string()),
            ApprovalDecision::Approve,
            "supervisor@example.com",
            None,
        )
        .await
        .expect_err("unknown approval must fail");

    assert!(matches!(error, OrchestratorError::ApprovalNotFound(_)));
    assert!(error.to_string().contains("ghost-approval"));
}
