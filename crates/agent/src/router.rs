use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use vigia_core::domain::agent::AgentId;
use vigia_core::store::AgentStore;

/// Confidence reported when no keyword family matches and the message falls
/// back to the support intent.
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

/// Floor applied when routing falls back to the first active agent, so a
/// fallback route is never reported as near-zero confidence.
pub const FALLBACK_ROUTE_CONFIDENCE_FLOOR: f64 = 0.3;

const CONFIDENCE_PER_KEYWORD: f64 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Enrollment,
    Planning,
    Support,
}

impl Intent {
    /// Fixed priority order; earlier intents win score ties.
    pub const PRIORITY: [Intent; 3] = [Self::Enrollment, Self::Planning, Self::Support];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrollment => "enrollment",
            Self::Planning => "planning",
            Self::Support => "support",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Enrollment => &[
                "matricular",
                "matricula",
                "inscripcion",
                "inscribir",
                "admision",
                "admitir",
                "enrollment",
                "enroll",
            ],
            Self::Planning => &[
                "horario",
                "calendario",
                "agenda",
                "planificacion",
                "planificar",
                "cronograma",
                "schedule",
                "planning",
            ],
            Self::Support => &[
                "ayuda",
                "problema",
                "soporte",
                "incidencia",
                "consulta",
                "duda",
                "support",
                "help",
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f64,
    pub entities: Vec<String>,
}

impl Classification {
    fn fallback() -> Self {
        Self { intent: Intent::Support, confidence: FALLBACK_CONFIDENCE, entities: Vec::new() }
    }
}

/// Keyword classifier over the three intent families. Unclassifiable input
/// always falls back to support rather than an unknown intent.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn classify(&self, message: &str) -> Classification {
        let normalized = message.trim().to_lowercase();
        if normalized.is_empty() {
            return Classification::fallback();
        }

        let mut best: Option<(Intent, Vec<(usize, &'static str)>)> = None;
        for intent in Intent::PRIORITY {
            let mut matched: Vec<(usize, &'static str)> = intent
                .keywords()
                .iter()
                .filter_map(|keyword| {
                    normalized.find(keyword).map(|position| (position, *keyword))
                })
                .collect();
            matched.sort_by_key(|(position, _)| *position);

            let better = match &best {
                Some((_, best_matched)) => matched.len() > best_matched.len(),
                None => !matched.is_empty(),
            };
            if better {
                best = Some((intent, matched));
            }
        }

        match best {
            Some((intent, matched)) => {
                let entities: Vec<String> =
                    matched.into_iter().map(|(_, keyword)| keyword.to_string()).collect();
                Classification {
                    intent,
                    confidence: (entities.len() as f64 * CONFIDENCE_PER_KEYWORD).min(1.0),
                    entities,
                }
            }
            None => Classification::fallback(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub agent_id: Option<AgentId>,
    pub confidence: f64,
    pub reasoning: String,
}

/// Picks the agent that should handle an inbound free-text request.
///
/// Routing is catalog-wide rather than tenant-scoped: callers narrow the
/// catalog before handing it to the router.
pub struct AgentRouter {
    agents: Arc<dyn AgentStore>,
    classifier: IntentClassifier,
    max_candidates: u32,
    last_confidence: Mutex<f64>,
}

impl AgentRouter {
    pub fn new(agents: Arc<dyn AgentStore>, max_candidates: u32) -> Self {
        Self {
            agents,
            classifier: IntentClassifier,
            max_candidates,
            last_confidence: Mutex::new(0.0),
        }
    }

    pub fn classify(&self, message: &str) -> Classification {
        let classification = self.classifier.classify(message);
        self.store_confidence(classification.confidence);
        classification
    }

    /// Confidence of the most recent classification; `0.0` before any call.
    pub fn last_confidence(&self) -> f64 {
        match self.last_confidence.lock() {
            Ok(confidence) => *confidence,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Routes a message: classify, then match the winning intent's keyword
    /// family against active agent names. With no name match the first
    /// active agent is chosen at visibly reduced confidence; with no agents
    /// or a storage fault, routing fails open to no agent at all.
    pub async fn route(&self, message: &str) -> RoutingDecision {
        let classification = self.classify(message);

        let candidates = match self.agents.list_active(self.max_candidates).await {
            Ok(candidates) => candidates,
            Err(error) => {
                tracing::warn!(error = %error, "agent routing is unavailable");
                return RoutingDecision {
                    agent_id: None,
                    confidence: 0.0,
                    reasoning: format!("routing unavailable: {error}"),
                };
            }
        };

        if candidates.is_empty() {
            return RoutingDecision {
                agent_id: None,
                confidence: 0.0,
                reasoning: "no agents available".to_string(),
            };
        }

        let family = classification.intent.keywords();
        for agent in &candidates {
            let name = agent.name.to_lowercase();
            if let Some(keyword) = family.iter().copied().find(|keyword| name.contains(keyword)) {
                tracing::debug!(
                    agent_id = %agent.id,
                    intent = classification.intent.as_str(),
                    keyword,
                    "routed by agent name match"
                );
                return RoutingDecision {
                    agent_id: Some(agent.id.clone()),
                    confidence: classification.confidence,
                    reasoning: format!(
                        "agent `{}` matches intent {} via keyword `{keyword}`",
                        agent.name,
                        classification.intent.as_str()
                    ),
                };
            }
        }

        let first = &candidates[0];
        let confidence =
            (classification.confidence * 0.5).max(FALLBACK_ROUTE_CONFIDENCE_FLOOR);
        RoutingDecision {
            agent_id: Some(first.id.clone()),
            confidence,
            reasoning: format!(
                "no agent name matches intent {}; falling back to `{}`",
                classification.intent.as_str(),
                first.name
            ),
        }
    }

    fn store_confidence(&self, confidence: f64) {
        match self.last_confidence.lock() {
            Ok(mut last) => *last = confidence,
            Err(poisoned) => *poisoned.into_inner() = confidence,
        }
    }
}
