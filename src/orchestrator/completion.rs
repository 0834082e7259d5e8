//! Completion Detector: decides, exactly once per finalization, that a run is done.

use crate::catalog::SectionCatalog;
use crate::orchestrator::tracker::ProgressTracker;
use crate::report::{assemble_document, DocumentStructure};
use crate::run::{RunAggregate, RunOutcome};
use crate::types::RunId;
use std::sync::Arc;
use tracing::info;

/// The result of a finalization, handed to the optional sink.
#[derive(Debug, Clone)]
pub struct FinalReport {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    pub aggregate: RunAggregate,
    /// Completed sections in catalog order; failed sections are excluded.
    pub document: DocumentStructure,
}

/// Receives every finalization of every run exactly once.
pub trait FinalizationSink: Send + Sync {
    fn on_finalized(&self, report: &FinalReport);
}

pub struct CompletionDetector {
    catalog: Arc<SectionCatalog>,
    sink: Option<Arc<dyn FinalizationSink>>,
}

impl CompletionDetector {
    pub fn new(catalog: Arc<SectionCatalog>, sink: Option<Arc<dyn FinalizationSink>>) -> Self {
        Self { catalog, sink }
    }

    /// Check the aggregate observed after an update.
    ///
    /// Returns the report only to the caller that won the finalization claim. Any number of
    /// concurrent callers may observe a settled aggregate; the atomic claim picks one.
    pub fn check(&self, tracker: &ProgressTracker, aggregate: &RunAggregate) -> Option<FinalReport> {
        if !aggregate.is_settled() || tracker.is_abandoned() {
            return None;
        }
        if !tracker.try_claim_finalization() {
            return None;
        }

        let outcome = RunOutcome::classify(aggregate);
        let run = tracker.finalize(outcome);
        let document = assemble_document(&run, &self.catalog);

        info!(
            run_id = %run.run_id,
            status = %run.status,
            completed = aggregate.completed,
            failed = aggregate.failed,
            total = aggregate.total,
            partial = run.is_partially_complete,
            "Run finalized"
        );

        let report = FinalReport {
            run_id: run.run_id.clone(),
            outcome,
            aggregate: *aggregate,
            document,
        };
        if let Some(sink) = &self.sink {
            sink.on_finalized(&report);
        }
        Some(report)
    }
}
