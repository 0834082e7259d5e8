//! Batch Scheduler: drives a fixed, catalog-ordered list of sections in fixed-size batches.
//!
//! Each batch is fanned out concurrently and joined on its immediate outcomes. Sections
//! that schedule a delayed retry leave the batch and go to the pass's `RetryQueue`, so the
//! next batch starts without waiting on retry timers. The pass returns once the queue has
//! drained, i.e. once every section it owns is terminal (or the run was abandoned).

use crate::catalog::SectionDefinition;
use crate::orchestrator::tracker::ProgressTracker;
use crate::orchestrator::worker::{AttemptOutcome, SectionWorker};
use crate::types::RunContext;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Share of overall progress the scheduler reports; the rest is reserved for finalization.
pub const SCHEDULER_PROGRESS_SHARE: usize = 90;

/// Split sections into consecutive batches, preserving order.
pub fn partition(sections: &[SectionDefinition], batch_size: usize) -> Vec<&[SectionDefinition]> {
    sections.chunks(batch_size.max(1)).collect()
}

/// `(attempted / total) * 90`, rounded down.
pub fn batch_progress(attempted: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (attempted.min(total) * SCHEDULER_PROGRESS_SHARE / total) as u8
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub batches: usize,
    pub attempts: usize,
    pub completed: usize,
    pub failed: usize,
    pub retries: usize,
    pub skipped: usize,
}

impl PassSummary {
    fn record(&mut self, outcome: &AttemptOutcome) {
        match outcome {
            AttemptOutcome::Completed { .. } => {
                self.attempts += 1;
                self.completed += 1;
            }
            AttemptOutcome::Failed { .. } => {
                self.attempts += 1;
                self.failed += 1;
            }
            AttemptOutcome::RetryScheduled { .. } => {
                self.attempts += 1;
                self.retries += 1;
            }
            AttemptOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Delayed re-dispatch of sections whose attempt scheduled a retry.
///
/// Each entry sleeps for the retry delay and re-enters the same worker path, repeating
/// while the worker keeps scheduling retries.
pub struct RetryQueue {
    worker: SectionWorker,
    context: Arc<RunContext>,
    tasks: JoinSet<Vec<AttemptOutcome>>,
}

impl RetryQueue {
    pub fn new(worker: SectionWorker, context: Arc<RunContext>) -> Self {
        Self {
            worker,
            context,
            tasks: JoinSet::new(),
        }
    }

    pub fn schedule(&mut self, section: SectionDefinition, after: Duration) {
        let worker = self.worker.clone();
        let context = self.context.clone();
        self.tasks.spawn(async move {
            let mut outcomes = Vec::new();
            let mut delay = after;
            loop {
                tokio::time::sleep(delay).await;
                let outcome = worker.attempt(&section, &context).await;
                let next = match &outcome {
                    AttemptOutcome::RetryScheduled { after, .. } => Some(*after),
                    _ => None,
                };
                outcomes.push(outcome);
                match next {
                    Some(after) => delay = after,
                    None => break,
                }
            }
            outcomes
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    async fn drain(&mut self, summary: &mut PassSummary) {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(outcomes) => outcomes.iter().for_each(|o| summary.record(o)),
                Err(e) => warn!(error = %e, "Retry task did not complete"),
            }
        }
    }
}

pub struct BatchScheduler {
    worker: SectionWorker,
    tracker: Arc<ProgressTracker>,
    batch_size: usize,
}

impl BatchScheduler {
    pub fn new(worker: SectionWorker, tracker: Arc<ProgressTracker>, batch_size: usize) -> Self {
        Self {
            worker,
            tracker,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn run_pass(&self, sections: Vec<SectionDefinition>, context: RunContext) -> PassSummary {
        let run_id = self.tracker.run_id().clone();
        let context = Arc::new(context);
        let total = sections.len();
        let batches = partition(&sections, self.batch_size);
        let total_batches = batches.len();
        let mut retries = RetryQueue::new(self.worker.clone(), context.clone());
        let mut summary = PassSummary::default();
        let mut attempted = 0usize;

        info!(
            run_id = %run_id,
            total_sections = total,
            total_batches,
            batch_size = self.batch_size,
            "Starting scheduler pass"
        );

        for (index, batch) in batches.into_iter().enumerate() {
            if self.tracker.is_abandoned() {
                info!(run_id = %run_id, batch = index + 1, "Run abandoned, stopping dispatch");
                break;
            }
            debug!(
                run_id = %run_id,
                batch = index + 1,
                total_batches,
                sections = ?batch.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
                "Dispatching batch"
            );

            let mut in_flight = FuturesUnordered::new();
            for section in batch {
                let worker = &self.worker;
                let context = context.as_ref();
                in_flight.push(async move { (section, worker.attempt(section, context).await) });
            }
            while let Some((section, outcome)) = in_flight.next().await {
                if let AttemptOutcome::RetryScheduled { after, .. } = &outcome {
                    retries.schedule(section.clone(), *after);
                }
                summary.record(&outcome);
            }

            summary.batches += 1;
            attempted += batch.len();
            let progress = batch_progress(attempted, total);
            self.tracker.set_batch_progress(progress);
            info!(
                run_id = %run_id,
                batch = index + 1,
                total_batches,
                attempted,
                total_sections = total,
                progress,
                pending_retries = retries.len(),
                "Batch resolved"
            );
        }

        retries.drain(&mut summary).await;
        info!(
            run_id = %run_id,
            completed = summary.completed,
            failed = summary.failed,
            retries = summary.retries,
            "Scheduler pass finished"
        );
        summary
    }
}
