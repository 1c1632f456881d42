use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::execution::ExecutionStatus;

/// Lifecycle events an execution can receive after it has started.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEvent {
    Pause,
    Resume,
    Cancel,
    RequestApproval,
    Complete,
    Fail,
}

impl ExecutionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Cancel => "cancel",
            Self::RequestApproval => "request_approval",
            Self::Complete => "complete",
            Self::Fail => "fail",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid transition from {status:?} using event {event:?}")]
    InvalidTransition { status: ExecutionStatus, event: ExecutionEvent },
}

/// Applies a lifecycle event to the current status.
///
/// Gated executions stored as `awaiting_approval` accept the same exits as
/// `paused`: the approval resolution resumes or cancels them. Terminal
/// statuses accept nothing.
pub fn transition(
    current: &ExecutionStatus,
    event: &ExecutionEvent,
) -> Result<ExecutionStatus, TransitionError> {
    use ExecutionEvent::{Cancel, Complete, Fail, Pause, RequestApproval, Resume};
    use ExecutionStatus::{
        AwaitingApproval, Cancelled, Completed, Failed, Paused, Running,
    };

    let to = match (current, event) {
        (Running, Pause) => Paused,
        (Running, RequestApproval) => AwaitingApproval,
        (Running, Complete) => Completed,
        (Running, Fail) => Failed,
        (Running, Cancel) | (Paused, Cancel) | (AwaitingApproval, Cancel) => Cancelled,
        (Paused, Resume) | (AwaitingApproval, Resume) => Running,
        _ => {
            return Err(TransitionError::InvalidTransition { status: *current, event: *event });
        }
    };

    Ok(to)
}
