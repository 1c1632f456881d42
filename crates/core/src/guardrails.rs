use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;
use crate::domain::agent::{Agent, AutonomyLevel};
use crate::domain::execution::Execution;

/// Platform-wide cost ceiling applied when no threshold is configured.
pub const DEFAULT_COST_ALERT_THRESHOLD: f64 = 10.0;

/// Process-wide guardrail configuration, injected from `AppConfig` rather
/// than read from any global lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct GuardrailSettings {
    /// Spend ceiling per execution, in the same currency unit as
    /// `Execution::cost`.
    pub cost_alert_threshold: f64,
}

impl Default for GuardrailSettings {
    fn default() -> Self {
        Self { cost_alert_threshold: DEFAULT_COST_ALERT_THRESHOLD }
    }
}

/// Outcome of evaluating a single proposed action against agent policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailCheckResult {
    pub allowed: bool,
    pub requires_approval: bool,
    pub reason: String,
}

impl GuardrailCheckResult {
    fn allow() -> Self {
        Self { allowed: true, requires_approval: false, reason: String::new() }
    }

    fn allow_with_approval(reason: impl Into<String>) -> Self {
        Self { allowed: true, requires_approval: true, reason: reason.into() }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self { allowed: false, requires_approval: false, reason: reason.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum BudgetViolation {
    #[error("tokens used {used} exceeds token budget {budget}")]
    TokenBudgetExceeded { used: u64, budget: u32 },
    #[error("actions taken {count} reaches per-execution action limit {limit}")]
    ActionCountExceeded { count: usize, limit: u32 },
    #[error("cost {cost:.2} exceeds alert threshold {threshold:.2}")]
    CostThresholdExceeded { cost: f64, threshold: f64 },
    #[error("associated agent `{agent_id}` not found")]
    AgentUnavailable { agent_id: String },
    #[error("budget inspection failed: {0}")]
    InspectionFailed(String),
}

/// Cumulative-resource verdict. Violations accumulate; they are never
/// short-circuited, so co-occurring breaches are all reported together.
#[derive(Clone, Debug, PartialEq)]
pub struct EnforcementResult {
    pub passed: bool,
    pub violations: Vec<BudgetViolation>,
}

impl EnforcementResult {
    pub fn pass() -> Self {
        Self { passed: true, violations: Vec::new() }
    }

    pub fn from_violations(violations: Vec<BudgetViolation>) -> Self {
        Self { passed: violations.is_empty(), violations }
    }

    /// Fail-closed result for when budgets could not be inspected at all.
    pub fn fail_closed(violation: BudgetViolation) -> Self {
        Self { passed: false, violations: vec![violation] }
    }
}

/// Policy engine evaluating proposed actions (`check`) and cumulative
/// resource consumption (`enforce_*`) against agent guardrails.
pub struct GuardrailsEnforcer {
    settings: GuardrailSettings,
    clock: Arc<dyn Clock>,
}

impl GuardrailsEnforcer {
    pub fn new(settings: GuardrailSettings, clock: Arc<dyn Clock>) -> Self {
        Self { settings, clock }
    }

    /// The agent's autonomy level. Unknown stored encodings were already
    /// resolved to L0 at the decode boundary, so this never fails.
    pub fn level(&self, agent: &Agent) -> AutonomyLevel {
        agent.autonomy_level
    }

    pub fn is_action_allowed(&self, agent: &Agent, action: &str) -> bool {
        agent.capabilities.allows(action)
    }

    /// Evaluates one proposed action: whitelist, autonomy floor, schedule
    /// window, then the approval list.
    pub fn check(&self, agent: &Agent, action: &str) -> GuardrailCheckResult {
        if !self.is_action_allowed(agent, action) {
            return GuardrailCheckResult::deny(format!(
                "action `{action}` is not in the capability whitelist"
            ));
        }

        if self.level(agent) == AutonomyLevel::L0 {
            return GuardrailCheckResult::deny(
                "L0 agents are informational only and cannot execute actions",
            );
        }

        if let Some(window) = &agent.guardrails.schedule_restrictions {
            let hour = self.clock.local_hour();
            if !window.contains(hour) {
                return GuardrailCheckResult::deny(format!(
                    "outside the allowed schedule window {}:00-{}:00 (local hour {hour})",
                    window.start_hour, window.end_hour
                ));
            }
        }

        if agent.guardrails.requires_approval_for(action) {
            return GuardrailCheckResult::allow_with_approval(format!(
                "action `{action}` requires human approval"
            ));
        }

        GuardrailCheckResult::allow()
    }

    pub fn token_budget(&self, agent: &Agent) -> u32 {
        agent.guardrails.token_budget()
    }

    pub fn action_budget(&self, agent: &Agent) -> u32 {
        agent.guardrails.action_budget()
    }

    /// Platform-wide cost ceiling; not a per-agent setting.
    pub fn cost_budget(&self) -> f64 {
        self.settings.cost_alert_threshold
    }

    /// Structural pre-flight on the agent's own policy. An agent carries no
    /// cumulative counters of its own, so there is nothing to compare yet.
    pub fn enforce_agent_policy(&self, _agent: &Agent) -> EnforcementResult {
        EnforcementResult::pass()
    }

    /// Compares an execution's cumulative counters against the owning
    /// agent's budgets and the platform cost ceiling.
    pub fn enforce_execution_budgets(
        &self,
        agent: &Agent,
        execution: &Execution,
    ) -> EnforcementResult {
        let mut violations = Vec::new();

        let token_budget = self.token_budget(agent);
        if execution.tokens_used > u64::from(token_budget) {
            violations.push(BudgetViolation::TokenBudgetExceeded {
                used: execution.tokens_used,
                budget: token_budget,
            });
        }

        let action_budget = self.action_budget(agent);
        let action_count = execution.actions_taken.count();
        if action_count >= action_budget as usize {
            violations.push(BudgetViolation::ActionCountExceeded {
                count: action_count,
                limit: action_budget,
            });
        }

        let threshold = self.cost_budget();
        if execution.cost > threshold {
            violations
                .push(BudgetViolation::CostThresholdExceeded { cost: execution.cost, threshold });
        }

        EnforcementResult::from_violations(violations)
    }
}
