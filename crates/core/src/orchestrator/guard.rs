//! At-most-one-active-execution guard for the pipeline runner.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::backend::{BackendError, ExecutionStatus, ExecutionSummary, PipelineRunner};
use crate::lease::PipelineLease;
use crate::metrics;

use super::{emit, OrchestrationError, Outcome, PipelineStart, SkipReason};

/// What the guard decided from the execution history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Start a new execution. Carries the latest execution, if any.
    Start(Option<ExecutionSummary>),
    Skip(SkipReason, Option<ExecutionSummary>),
}

/// Decide whether to start a new execution.
///
/// The latest execution is the one with the greatest `started_at`; the
/// runner's ordering is not relied on. With `max_consecutive_failures = Some(n)`
/// and the `n` most recent executions all `Failed`, the restart is refused.
pub fn decide(
    executions: &[ExecutionSummary],
    max_consecutive_failures: Option<u32>,
) -> GuardDecision {
    let mut sorted: Vec<&ExecutionSummary> = executions.iter().collect();
    sorted.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    let Some(latest) = sorted.first().map(|e| (*e).clone()) else {
        return GuardDecision::Start(None);
    };

    match latest.status {
        ExecutionStatus::InProgress => {
            GuardDecision::Skip(SkipReason::ExecutionInProgress, Some(latest))
        }
        ExecutionStatus::Failed => {
            if let Some(limit) = max_consecutive_failures {
                let failures = sorted
                    .iter()
                    .take_while(|e| e.status == ExecutionStatus::Failed)
                    .count();
                if failures >= limit as usize {
                    return GuardDecision::Skip(SkipReason::RetryLimitReached, Some(latest));
                }
            }
            GuardDecision::Start(Some(latest))
        }
        ExecutionStatus::Succeeded | ExecutionStatus::Stopped | ExecutionStatus::Superseded => {
            GuardDecision::Start(Some(latest))
        }
    }
}

/// Checks the latest execution and starts a new one when appropriate.
///
/// Check-then-act. When a lease store is configured the check and the start
/// happen under an expiring lease keyed by pipeline id.
pub struct ExecutionGuard {
    runner: Arc<dyn PipelineRunner>,
    pipeline_id: String,
    lease: Option<(Arc<dyn PipelineLease>, Duration)>,
    max_consecutive_failures: Option<u32>,
    audit: Option<AuditHandle>,
}

impl ExecutionGuard {
    pub fn new(
        runner: Arc<dyn PipelineRunner>,
        pipeline_id: impl Into<String>,
        audit: Option<AuditHandle>,
    ) -> Self {
        Self {
            runner,
            pipeline_id: pipeline_id.into(),
            lease: None,
            max_consecutive_failures: None,
            audit,
        }
    }

    pub fn with_lease(mut self, lease: Arc<dyn PipelineLease>, ttl: Duration) -> Self {
        self.lease = Some((lease, ttl));
        self
    }

    pub fn with_max_consecutive_failures(mut self, limit: Option<u32>) -> Self {
        self.max_consecutive_failures = limit;
        self
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Ensure an execution is running for the configured pipeline.
    pub async fn ensure_running(&self) -> Result<Outcome<PipelineStart>, OrchestrationError> {
        let Some((lease, ttl)) = &self.lease else {
            return self.check_and_start().await;
        };

        let holder = uuid::Uuid::new_v4().to_string();
        if !lease.try_acquire(&self.pipeline_id, &holder, *ttl)? {
            info!(pipeline_id = %self.pipeline_id, "Pipeline lease held elsewhere, skipping start");
            metrics::GUARD_DECISIONS.with_label_values(&["lease_held"]).inc();
            self.audit_skip(SkipReason::LeaseHeld, None).await;
            return Ok(Outcome::Skipped(SkipReason::LeaseHeld));
        }

        let result = self.check_and_start().await;

        if let Err(e) = lease.release(&self.pipeline_id, &holder) {
            // The lease expires on its own.
            warn!(pipeline_id = %self.pipeline_id, error = %e, "Failed to release pipeline lease");
        }
        result
    }

    async fn check_and_start(&self) -> Result<Outcome<PipelineStart>, OrchestrationError> {
        let executions = self
            .runner
            .list_recent_executions(&self.pipeline_id)
            .await
            .map_err(|e| self.map_runner_error(e))?;

        match decide(&executions, self.max_consecutive_failures) {
            GuardDecision::Skip(reason, latest) => {
                let latest_id = latest.map(|e| e.execution_id);
                info!(
                    pipeline_id = %self.pipeline_id,
                    execution_id = latest_id.as_deref().unwrap_or("-"),
                    reason = %reason,
                    "Not starting pipeline execution"
                );
                let label = match reason {
                    SkipReason::RetryLimitReached => "retry_limit",
                    _ => "in_progress",
                };
                metrics::GUARD_DECISIONS.with_label_values(&[label]).inc();
                if reason == SkipReason::RetryLimitReached {
                    warn!(
                        pipeline_id = %self.pipeline_id,
                        "Automatic restart suppressed after repeated failed executions"
                    );
                }
                self.audit_skip(reason, latest_id).await;
                Ok(Outcome::Skipped(reason))
            }
            GuardDecision::Start(latest) => {
                let previous_status = latest.as_ref().map(|e| e.status);
                let execution_id = self
                    .runner
                    .start_execution(&self.pipeline_id)
                    .await
                    .map_err(|e| self.map_runner_error(e))?;

                info!(
                    pipeline_id = %self.pipeline_id,
                    execution_id = %execution_id,
                    previous = previous_status.map(|s| s.as_str()).unwrap_or("none"),
                    "Started pipeline execution"
                );
                metrics::GUARD_DECISIONS.with_label_values(&["started"]).inc();
                emit(
                    &self.audit,
                    AuditEvent::PipelineExecutionStarted {
                        pipeline_id: self.pipeline_id.clone(),
                        execution_id: execution_id.clone(),
                        previous_status: previous_status.map(|s| s.as_str().to_string()),
                    },
                )
                .await;

                Ok(Outcome::Done(PipelineStart {
                    pipeline_id: self.pipeline_id.clone(),
                    execution_id,
                    previous_status,
                }))
            }
        }
    }

    fn map_runner_error(&self, e: BackendError) -> OrchestrationError {
        match e {
            BackendError::NotFound(detail) => {
                error!(pipeline_id = %self.pipeline_id, "Pipeline not found: {}", detail);
                OrchestrationError::Configuration(format!(
                    "pipeline {} not found: {}",
                    self.pipeline_id, detail
                ))
            }
            other => {
                warn!(
                    pipeline_id = %self.pipeline_id,
                    error = %other,
                    "Pipeline runner call failed"
                );
                other.into()
            }
        }
    }

    async fn audit_skip(&self, reason: SkipReason, latest_execution_id: Option<String>) {
        emit(
            &self.audit,
            AuditEvent::PipelineStartSkipped {
                pipeline_id: self.pipeline_id.clone(),
                reason: reason.as_str().to_string(),
                latest_execution_id,
            },
        )
        .await;
    }
}
