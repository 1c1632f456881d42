use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::{AgentId, TenantId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    UserRequest,
    Schedule,
    Event,
    Webhook,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRequest => "user_request",
            Self::Schedule => "schedule",
            Self::Event => "event",
            Self::Webhook => "webhook",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user_request" => Some(Self::UserRequest),
            "schedule" => Some(Self::Schedule),
            "event" => Some(Self::Event),
            "webhook" => Some(Self::Webhook),
            _ => None,
        }
    }

    /// Resolves the stored field value, defaulting unknown or missing
    /// encodings to `user_request`.
    pub fn resolve(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or(Self::UserRequest)
    }
}

impl Default for TriggerType {
    fn default() -> Self {
        Self::UserRequest
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Paused,
    AwaitingApproval,
    Cancelled,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "awaiting_approval" => Some(Self::AwaitingApproval),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Failed)
    }
}

/// Ordered list of action names taken during an execution, persisted as a
/// JSON array. Malformed encodings decode to an empty log rather than
/// failing the read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLog(Vec<String>);

impl ActionLog {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn decode(raw: &str) -> Self {
        Self(serde_json::from_str(raw).unwrap_or_default())
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn record(&mut self, action: impl Into<String>) {
        self.0.push(action.into());
    }

    pub fn count(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

/// One run of an agent. Created by the orchestrator in `running` status and
/// mutated only through its lifecycle operations; holds a one-way reference
/// back to the owning agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub agent_id: AgentId,
    pub tenant_id: Option<TenantId>,
    pub trigger_type: TriggerType,
    pub trigger_context: serde_json::Value,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub actions_taken: ActionLog,
    pub tokens_used: u64,
    pub cost: f64,
}
