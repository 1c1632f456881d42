use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tiered permission scale. L0 is informational only and can never act,
/// L1 acts freely within its whitelist, L2 and above may act but listed
/// actions must pass human approval first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AutonomyLevel {
    L0,
    L1,
    L2,
    L3,
    L4,
}

impl AutonomyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L0 => "L0",
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::L4 => "L4",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "L0" => Some(Self::L0),
            "L1" => Some(Self::L1),
            "L2" => Some(Self::L2),
            "L3" => Some(Self::L3),
            "L4" => Some(Self::L4),
            _ => None,
        }
    }

    /// Resolves the stored field value. Missing or unrecognized encodings
    /// degrade to L0 so an unknown level can never act.
    pub fn resolve(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or(Self::L0)
    }

    /// L2 and above route gated actions through the approval flow.
    pub fn gated(&self) -> bool {
        *self >= Self::L2
    }
}

impl Default for AutonomyLevel {
    fn default() -> Self {
        Self::L0
    }
}

/// Action whitelist with permissive-by-absence semantics: an agent with no
/// capabilities field at all is unrestricted, while an explicit empty list
/// allows nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilitySet {
    Unrestricted,
    Listed(BTreeSet<String>),
}

impl CapabilitySet {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Listed(names.into_iter().map(Into::into).collect())
    }

    /// Decodes the stored column. `None` means no whitelist was ever
    /// configured; a malformed encoding collapses to an empty list, which
    /// allows nothing.
    pub fn decode(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Unrestricted,
            Some(encoded) => {
                let names: Vec<String> = serde_json::from_str(encoded).unwrap_or_default();
                Self::Listed(names.into_iter().collect())
            }
        }
    }

    pub fn encode(&self) -> Option<String> {
        match self {
            Self::Unrestricted => None,
            Self::Listed(names) => {
                Some(serde_json::to_string(names).unwrap_or_else(|_| "[]".to_string()))
            }
        }
    }

    pub fn allows(&self, action: &str) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Listed(names) => names.contains(action),
        }
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::Unrestricted
    }
}

/// Half-open local-clock window `[start_hour, end_hour)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl ScheduleWindow {
    pub fn contains(&self, hour: u8) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }
}

pub const DEFAULT_TOKEN_BUDGET: u32 = 50_000;
pub const DEFAULT_ACTION_BUDGET: u32 = 100;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailPolicy {
    pub max_tokens: Option<u32>,
    pub max_actions_per_execution: Option<u32>,
    pub requires_approval: BTreeSet<String>,
    pub schedule_restrictions: Option<ScheduleWindow>,
}

impl GuardrailPolicy {
    /// Decodes the stored column. Missing or malformed encodings yield the
    /// default policy; a schedule restriction object missing either bound is
    /// treated as unrestricted.
    pub fn decode(raw: Option<&str>) -> Self {
        let Some(encoded) = raw else {
            return Self::default();
        };
        serde_json::from_str::<PolicyPatch>(encoded).map(Self::from_patch).unwrap_or_default()
    }

    fn from_patch(patch: PolicyPatch) -> Self {
        let schedule_restrictions = patch.schedule_restrictions.and_then(|window| {
            match (window.start_hour, window.end_hour) {
                (Some(start_hour), Some(end_hour)) => Some(ScheduleWindow { start_hour, end_hour }),
                _ => None,
            }
        });

        Self {
            max_tokens: patch.max_tokens,
            max_actions_per_execution: patch.max_actions_per_execution,
            requires_approval: patch.requires_approval.unwrap_or_default().into_iter().collect(),
            schedule_restrictions,
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn token_budget(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_TOKEN_BUDGET)
    }

    pub fn action_budget(&self) -> u32 {
        self.max_actions_per_execution.unwrap_or(DEFAULT_ACTION_BUDGET)
    }

    pub fn requires_approval_for(&self, action: &str) -> bool {
        self.requires_approval.contains(action)
    }
}

#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    max_tokens: Option<u32>,
    max_actions_per_execution: Option<u32>,
    requires_approval: Option<Vec<String>>,
    schedule_restrictions: Option<WindowPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct WindowPatch {
    start_hour: Option<u8>,
    end_hour: Option<u8>,
}

/// Agent configuration. Immutable for the duration of any execution it owns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub tenant_id: Option<TenantId>,
    pub name: String,
    pub autonomy_level: AutonomyLevel,
    pub capabilities: CapabilitySet,
    pub guardrails: GuardrailPolicy,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
