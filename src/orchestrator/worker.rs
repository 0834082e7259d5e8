//! Section Worker: one generation attempt for one section plus its retry decision.
//!
//! Every transition is reported to the tracker (and the completion check) before the
//! attempt returns. Delays are not slept here; the scheduler owns the retry timers.

use crate::catalog::SectionDefinition;
use crate::config::OrchestratorConfig;
use crate::orchestrator::completion::CompletionDetector;
use crate::orchestrator::tracker::ProgressTracker;
use crate::provider::ContentService;
use crate::run::RunAggregate;
use crate::section::{SectionStatus, SectionTaskState};
use crate::types::RunContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Automatic retries after the first attempt.
    pub max_retries: u32,
    pub delay: Duration,
}

impl From<&OrchestratorConfig> for RetryPolicy {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: config.retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&OrchestratorConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Completed { fallback: bool },
    /// The section is back in Pending and must be re-dispatched after `after`.
    RetryScheduled { retry_count: u32, after: Duration },
    Failed { error: String },
    /// Nothing was attempted: the run was abandoned or the section was not Pending.
    Skipped,
}

impl AttemptOutcome {
    pub fn is_retry(&self) -> bool {
        matches!(self, AttemptOutcome::RetryScheduled { .. })
    }
}

#[derive(Clone)]
pub struct SectionWorker {
    service: Arc<dyn ContentService>,
    tracker: Arc<ProgressTracker>,
    detector: Arc<CompletionDetector>,
    policy: RetryPolicy,
}

impl SectionWorker {
    pub fn new(
        service: Arc<dyn ContentService>,
        tracker: Arc<ProgressTracker>,
        detector: Arc<CompletionDetector>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            service,
            tracker,
            detector,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn attempt(&self, section: &SectionDefinition, context: &RunContext) -> AttemptOutcome {
        let run_id = self.tracker.run_id().clone();
        let mut state = match self.tracker.section_state(&section.id) {
            Some(state) if state.status == SectionStatus::Pending => state,
            Some(state) => {
                debug!(
                    run_id = %run_id,
                    section_id = %section.id,
                    status = %state.status,
                    "Section not pending, skipping attempt"
                );
                return AttemptOutcome::Skipped;
            }
            None => return AttemptOutcome::Skipped,
        };

        if state.begin_attempt().is_err() || self.report(state.clone()).is_none() {
            return AttemptOutcome::Skipped;
        }
        debug!(
            run_id = %run_id,
            section_id = %section.id,
            retry_count = state.retry_count,
            service = self.service.name(),
            "Generating section"
        );

        match self.service.generate(section, context).await {
            Ok(generated) => {
                let fallback = generated.structured_data.is_none();
                if state.complete(generated).is_err() {
                    return AttemptOutcome::Skipped;
                }
                self.report(state);
                info!(
                    run_id = %run_id,
                    section_id = %section.id,
                    fallback,
                    "Section completed"
                );
                AttemptOutcome::Completed { fallback }
            }
            Err(err) if state.retry_count < self.policy.max_retries => {
                let message = err.to_string();
                if state.schedule_retry(message.clone()).is_err() {
                    return AttemptOutcome::Skipped;
                }
                let retry_count = state.retry_count;
                self.report(state);
                warn!(
                    run_id = %run_id,
                    section_id = %section.id,
                    retry_count,
                    max_retries = self.policy.max_retries,
                    error_kind = err.kind(),
                    error = %message,
                    "Section attempt failed, retry scheduled"
                );
                AttemptOutcome::RetryScheduled {
                    retry_count,
                    after: self.policy.delay,
                }
            }
            Err(err) => {
                let message = err.to_string();
                if state.fail(message.clone()).is_err() {
                    return AttemptOutcome::Skipped;
                }
                self.report(state);
                warn!(
                    run_id = %run_id,
                    section_id = %section.id,
                    error_kind = err.kind(),
                    error = %message,
                    "Section failed, retry budget exhausted"
                );
                AttemptOutcome::Failed { error: message }
            }
        }
    }

    fn report(&self, state: SectionTaskState) -> Option<RunAggregate> {
        let aggregate = self.tracker.update(state)?;
        self.detector.check(&self.tracker, &aggregate);
        Some(aggregate)
    }
}
