use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::cancel::CancelFlag;
use super::operation::{Operation, OperationKind, OperationStatus};
use crate::audit::{AuditEvent, AuditSink};
use crate::error::TagError;
use crate::provider::ResourceProvider;
use crate::resolver::ApiVersion;
use crate::resource::models::ResourceState;
use crate::tags::TagSet;

/// Default tick between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Terminal result of driving one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Succeeded(ResourceState),
    Failed(String),
    Canceled,
}

/// Submits tag updates and drives them to a terminal state.
///
/// Cheap to clone; a clone is moved into each worker task.
#[derive(Clone)]
pub struct UpdateOrchestrator {
    provider: Arc<dyn ResourceProvider>,
    audit: Arc<dyn AuditSink>,
    poll_interval: Duration,
}

impl UpdateOrchestrator {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        audit: Arc<dyn AuditSink>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            provider,
            audit,
            poll_interval,
        }
    }

    /// Send one update carrying the complete tag set.
    pub async fn submit(
        &self,
        resource: &ResourceState,
        api_version: &ApiVersion,
        tags: &TagSet,
        kind: OperationKind,
    ) -> Result<Operation, TagError> {
        let handle = self
            .provider
            .begin_update(resource, api_version, tags)
            .await?;
        let completed = handle.is_completed();

        let mut op = Operation::submitted(handle, kind);
        self.audit.record(&AuditEvent::Submitted {
            resource: resource.name.clone(),
            kind,
            api_version: api_version.to_string(),
        });

        // A synchronous response skips straight to the terminal state.
        op.advance(if completed {
            OperationStatus::Succeeded
        } else {
            OperationStatus::Running
        })?;

        info!(
            resource = %resource.id,
            operation = %op.handle().id,
            kind = %kind,
            "Operation submitted"
        );
        Ok(op)
    }

    /// Ask the provider for the operation's status and advance the state machine.
    pub async fn poll(&self, op: &mut Operation) -> Result<OperationStatus, TagError> {
        if op.status().is_terminal() {
            return Ok(op.status().clone());
        }
        let status = self.provider.poll_operation(op.handle()).await?;
        op.record_poll();
        debug!(operation = %op.handle().id, poll = op.polls(), status = %status, "Polled operation");

        match status {
            // A provider that still reports "accepted" has started the operation.
            OperationStatus::Pending => op.advance(OperationStatus::Running)?,
            other => op.advance(other)?,
        }
        Ok(op.status().clone())
    }

    /// Best-effort cancel; does not wait for the provider to confirm.
    pub async fn cancel(&self, op: &mut Operation) {
        if op.status().is_terminal() {
            return;
        }
        if let Err(e) = self.provider.cancel_operation(op.handle()).await {
            warn!(operation = %op.handle().id, error = %e, "Cancel request failed");
        }
        // Only fails if the operation is already terminal, checked above.
        let _ = op.advance(OperationStatus::Canceled);
    }

    /// Poll until a terminal state, checking `cancel` before every poll.
    pub async fn await_completion(
        &self,
        mut op: Operation,
        resource: &ResourceState,
        cancel: &CancelFlag,
    ) -> OperationOutcome {
        let kind = op.kind();

        loop {
            match op.status().clone() {
                OperationStatus::Succeeded => {
                    return self.finish_success(&op, resource).await;
                }
                OperationStatus::Failed(message) => {
                    self.audit.record(&AuditEvent::Failed {
                        resource: resource.name.clone(),
                        kind,
                        error: message.clone(),
                    });
                    return OperationOutcome::Failed(message);
                }
                OperationStatus::Canceled => {
                    self.audit.record(&AuditEvent::Canceled {
                        resource: resource.name.clone(),
                        kind,
                    });
                    return OperationOutcome::Canceled;
                }
                OperationStatus::Pending | OperationStatus::Running => {}
            }

            if cancel.is_cancelled() {
                info!(operation = %op.handle().id, "Cancellation requested");
                self.cancel(&mut op).await;
                continue;
            }

            match self.poll(&mut op).await {
                Ok(status) if status.is_terminal() => continue,
                Ok(_) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    let message = e.to_string();
                    // Surface a poll error as the operation's failure.
                    let _ = op.advance(OperationStatus::Failed(message));
                }
            }
        }
    }

    /// Submit, then drive to completion. Submission errors are failures.
    pub async fn run(
        &self,
        resource: &ResourceState,
        api_version: &ApiVersion,
        tags: &TagSet,
        kind: OperationKind,
        cancel: &CancelFlag,
    ) -> OperationOutcome {
        match self.submit(resource, api_version, tags, kind).await {
            Ok(op) => self.await_completion(op, resource, cancel).await,
            Err(e) => {
                let message = e.to_string();
                self.audit.record(&AuditEvent::Failed {
                    resource: resource.name.clone(),
                    kind,
                    error: message.clone(),
                });
                OperationOutcome::Failed(message)
            }
        }
    }

    async fn finish_success(&self, op: &Operation, resource: &ResourceState) -> OperationOutcome {
        let handle = op.handle();
        match self
            .provider
            .get_resource(&handle.resource_id, &handle.api_version)
            .await
        {
            Ok(state) => {
                self.audit.record(&AuditEvent::Succeeded {
                    resource: resource.name.clone(),
                    kind: op.kind(),
                    tags: state.tags.clone(),
                });
                OperationOutcome::Succeeded(state)
            }
            Err(e) => {
                let message = format!("update succeeded but reading the resource back failed: {}", e);
                self.audit.record(&AuditEvent::Failed {
                    resource: resource.name.clone(),
                    kind: op.kind(),
                    error: message.clone(),
                });
                OperationOutcome::Failed(message)
            }
        }
    }
}
