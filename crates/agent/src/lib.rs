//! Agent execution core - supervision of semi-autonomous agents
//!
//! This crate is the coordination layer of the vigia system:
//! - Starts, pauses, resumes and cancels agent executions
//! - Enforces guardrails (whitelists, budgets, schedules) before and during
//!   each execution
//! - Hands gated actions off to the human approval queue and applies the
//!   resolution
//! - Routes inbound free-text requests to the best-matching agent
//!
//! # Architecture
//!
//! The orchestrator follows a constrained loop:
//! 1. **Routing** (`router`) - Classify free text into an intent and pick an
//!    agent
//! 2. **Guardrail Enforcement** (`vigia_core::guardrails`) - Validate the
//!    proposed action against agent policy
//! 3. **Execution Lifecycle** (`orchestrator`) - Drive the execution status
//!    machine; the orchestrator is the only component that mutates it
//! 4. **Approval Hand-off** (`gateway`) - Park gated actions for human
//!    review
//!
//! # Safety Principle
//!
//! An agent never grants itself permissions. Autonomy levels, capability
//! whitelists and budgets are configuration read at the storage boundary;
//! an unknown or malformed configuration always degrades to the most
//! restrictive interpretation.

pub mod gateway;
pub mod orchestrator;
pub mod router;

pub use gateway::StoredApprovalGateway;
pub use orchestrator::{
    AgentOrchestrator, ApprovalDecision, ExecutionSnapshot, ExecutionStarted, ExecutionSummary,
    OrchestratorError, TransitionOutcome,
};
pub use router::{AgentRouter, Classification, Intent, IntentClassifier, RoutingDecision};
