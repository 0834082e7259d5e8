//! Progress Tracker: the single authoritative state map of one run.
//!
//! All mutation goes through one critical section that replaces a section state,
//! recomputes the aggregate, and writes a full snapshot to the History Store, so every
//! persisted snapshot reflects a consistent map.

use crate::error::ApiError;
use crate::history::HistoryStore;
use crate::run::{GenerationRun, RunAggregate, RunOutcome, RunStatus};
use crate::section::{SectionStatus, SectionTaskState};
use crate::types::{RunContext, RunId, SectionId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Authoritative state of one run.
///
/// Finalization fires once per settled pass: a manual retry (`reset_failed`) re-opens the
/// run and re-arms the gate, so a retried run finalizes (and notifies its sink) again.
pub struct ProgressTracker {
    run_id: RunId,
    run: Mutex<GenerationRun>,
    history: Arc<dyn HistoryStore>,
    /// One-shot finalization gate; see `try_claim_finalization`.
    finalized: AtomicBool,
    abandoned: AtomicBool,
    finalized_notify: Notify,
}

impl ProgressTracker {
    /// Wrap a run and persist its initial snapshot.
    pub fn new(run: GenerationRun, history: Arc<dyn HistoryStore>) -> Arc<Self> {
        let tracker = Arc::new(Self {
            run_id: run.run_id.clone(),
            finalized: AtomicBool::new(run.finalized),
            run: Mutex::new(run),
            history,
            abandoned: AtomicBool::new(false),
            finalized_notify: Notify::new(),
        });
        {
            let run = tracker.run.lock();
            tracker.persist(&run);
        }
        tracker
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn context(&self) -> RunContext {
        self.run.lock().context.clone()
    }

    pub fn section_state(&self, section_id: &str) -> Option<SectionTaskState> {
        if self.is_abandoned() {
            return None;
        }
        self.run.lock().section(section_id).cloned()
    }

    pub fn aggregate(&self) -> RunAggregate {
        self.run.lock().aggregate()
    }

    /// Point-in-time copy of the whole run.
    pub fn snapshot(&self) -> GenerationRun {
        self.run.lock().clone()
    }

    /// Replace one section's state.
    ///
    /// The write is checked against the stored status under the lock, so a stale writer
    /// (a second attempt racing on the same section) cannot regress it. Returns the
    /// recomputed aggregate, or `None` when the run has been abandoned, the section is not
    /// part of it, or the stored status does not allow the move.
    pub fn update(&self, state: SectionTaskState) -> Option<RunAggregate> {
        if self.is_abandoned() {
            debug!(
                run_id = %self.run_id,
                section_id = %state.section_id,
                status = %state.status,
                "Ignoring update for abandoned run"
            );
            return None;
        }

        let mut run = self.run.lock();
        if !run.sections.contains_key(&state.section_id) {
            warn!(
                run_id = %self.run_id,
                section_id = %state.section_id,
                "Ignoring update for section outside the run"
            );
            return None;
        }
        let current = run.sections[&state.section_id].status;
        if !current.can_advance_to(state.status) {
            warn!(
                run_id = %self.run_id,
                section_id = %state.section_id,
                from = %current,
                to = %state.status,
                "Rejecting stale section update"
            );
            return None;
        }
        let section_id = state.section_id.clone();
        let status = state.status;
        run.sections.insert(section_id.clone(), state);
        if run.status == RunStatus::Pending && status != SectionStatus::Pending {
            run.status = RunStatus::Generating;
        }
        let aggregate = run.aggregate();
        debug_assert!(aggregate.is_consistent());
        self.persist(&run);
        drop(run);

        debug!(
            run_id = %self.run_id,
            section_id = %section_id,
            status = %status,
            pending = aggregate.pending,
            generating = aggregate.generating,
            completed = aggregate.completed,
            failed = aggregate.failed,
            percent = aggregate.percent,
            "Section state updated"
        );
        Some(aggregate)
    }

    /// Record the scheduler's coarse progress figure (0-100).
    pub fn set_batch_progress(&self, percent: u8) {
        if self.is_abandoned() {
            return;
        }
        let mut run = self.run.lock();
        if run.finalized {
            return;
        }
        run.batch_progress = percent.min(100);
        self.persist(&run);
    }

    /// Atomic test-and-set of the finalization flag. Only the first caller gets `true`.
    pub fn try_claim_finalization(&self) -> bool {
        self.finalized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Write the terminal classification and wake anyone waiting on the run.
    pub fn finalize(&self, outcome: RunOutcome) -> GenerationRun {
        let mut run = self.run.lock();
        run.apply_outcome(outcome);
        self.persist(&run);
        let finished = run.clone();
        drop(run);
        self.finalized_notify.notify_waiters();
        finished
    }

    /// Wait until the run has been finalized or abandoned.
    pub async fn wait_finalized(&self) {
        loop {
            let notified = self.finalized_notify.notified();
            let done = self.is_abandoned() || self.run.lock().finalized;
            if done {
                return;
            }
            notified.await;
        }
    }

    /// Move every Failed section back to Pending for a manual retry and re-open the run.
    /// Re-arms the finalization gate.
    ///
    /// Returns the reset section ids in catalog order; empty when nothing had failed.
    pub fn reset_failed(&self) -> Result<Vec<SectionId>, ApiError> {
        let mut run = self.run.lock();
        let failed = run.ids_with_status(SectionStatus::Failed);
        if failed.is_empty() {
            return Ok(failed);
        }
        for id in &failed {
            if let Some(state) = run.sections.get_mut(id) {
                state.reset_for_manual_retry()?;
            }
        }
        run.status = RunStatus::Generating;
        run.finalized = false;
        run.is_partially_complete = false;
        run.compiled = false;
        run.batch_progress = 0;
        run.completed_at = None;
        self.finalized.store(false, Ordering::Release);
        self.persist(&run);
        Ok(failed)
    }

    /// Record a successful compilation. Returns the resulting run status.
    pub fn mark_compiled(&self) -> RunStatus {
        let mut run = self.run.lock();
        run.compiled = true;
        if run.status == RunStatus::Generated {
            run.status = RunStatus::Compiled;
        }
        self.persist(&run);
        run.status
    }

    /// Detach the run: later updates become no-ops.
    pub fn abandon(&self) {
        self.abandoned.store(true, Ordering::Release);
        self.finalized_notify.notify_waiters();
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }

    fn persist(&self, run: &GenerationRun) {
        if let Err(e) = self.history.snapshot(&self.run_id, run) {
            warn!(run_id = %self.run_id, error = %e, "Failed to persist run snapshot");
        }
    }
}
