use std::fmt;

use crate::error::TagError;
use crate::provider::OperationHandle;

/// Status of a long-running update.
///
/// `Pending` is the instant after submission before the first poll.
/// `Succeeded`, `Failed` and `Canceled` are terminal and absorbing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Running,
    Succeeded,
    Failed(String),
    Canceled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Succeeded | OperationStatus::Failed(_) | OperationStatus::Canceled
        )
    }

    fn label(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Running => "running",
            OperationStatus::Succeeded => "succeeded",
            OperationStatus::Failed(_) => "failed",
            OperationStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Failed(msg) => write!(f, "failed: {}", msg),
            other => f.write_str(other.label()),
        }
    }
}

/// Why an operation was submitted. Only affects how it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Update,
    Rollback,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Update => write!(f, "update"),
            OperationKind::Rollback => write!(f, "rollback"),
        }
    }
}

/// An update in flight: its handle plus a checked state machine.
#[derive(Debug, Clone)]
pub struct Operation {
    handle: OperationHandle,
    kind: OperationKind,
    status: OperationStatus,
    polls: u32,
}

impl Operation {
    pub fn submitted(handle: OperationHandle, kind: OperationKind) -> Self {
        Self {
            handle,
            kind,
            status: OperationStatus::Pending,
            polls: 0,
        }
    }

    pub fn handle(&self) -> &OperationHandle {
        &self.handle
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn status(&self) -> &OperationStatus {
        &self.status
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn record_poll(&mut self) {
        self.polls += 1;
    }

    /// Move to `next`. Leaving a terminal state, or going back to `Pending`,
    /// is rejected.
    pub fn advance(&mut self, next: OperationStatus) -> Result<(), TagError> {
        let allowed = !self.status.is_terminal() && next != OperationStatus::Pending;
        if !allowed {
            return Err(TagError::InvalidTransition {
                from: self.status.label().to_string(),
                to: next.label().to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}
