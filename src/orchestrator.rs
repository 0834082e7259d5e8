//! Section generation orchestrator.
//!
//! `Orchestrator` is the caller-facing surface: start a run, observe it, retry its failed
//! sections, and compile whatever has completed. Each run owns one `ProgressTracker`;
//! scheduler passes run as detached tokio tasks that report into it.

pub mod completion;
pub mod scheduler;
pub mod tracker;
pub mod worker;

pub use completion::{CompletionDetector, FinalReport, FinalizationSink};
pub use scheduler::{BatchScheduler, PassSummary, RetryQueue};
pub use tracker::ProgressTracker;
pub use worker::{AttemptOutcome, RetryPolicy, SectionWorker};

use crate::catalog::{SectionCatalog, SectionDefinition};
use crate::config::OrchestratorConfig;
use crate::error::ApiError;
use crate::history::HistoryStore;
use crate::provider::ContentService;
use crate::report::{assemble_document, CompiledArtifact, DocumentCompiler, DocumentStructure};
use crate::run::{GenerationRun, RunAggregate, RunStatus};
use crate::section::SectionTaskState;
use crate::types::{RunContext, RunId, SectionId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Caller view of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatusReport {
    pub run_id: RunId,
    pub document_type: String,
    pub status: RunStatus,
    pub aggregate: RunAggregate,
    pub batch_progress: u8,
    pub is_partially_complete: bool,
    pub compiled: bool,
    pub finalized: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Per-section states in catalog order.
    pub sections: Vec<SectionTaskState>,
}

impl From<&GenerationRun> for RunStatusReport {
    fn from(run: &GenerationRun) -> Self {
        Self {
            run_id: run.run_id.clone(),
            document_type: run.context.document_type.clone(),
            status: run.status,
            aggregate: run.aggregate(),
            batch_progress: run.batch_progress,
            is_partially_complete: run.is_partially_complete,
            compiled: run.compiled,
            finalized: run.finalized,
            created_at: run.created_at.clone(),
            completed_at: run.completed_at.clone(),
            sections: run.ordered_sections().into_iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileResult {
    pub document: DocumentStructure,
    pub artifact: CompiledArtifact,
    /// Run status after compilation.
    pub status: RunStatus,
}

pub struct Orchestrator {
    catalog: Arc<SectionCatalog>,
    service: Arc<dyn ContentService>,
    history: Arc<dyn HistoryStore>,
    compiler: Arc<dyn DocumentCompiler>,
    config: OrchestratorConfig,
    detector: Arc<CompletionDetector>,
    runs: RwLock<HashMap<RunId, Arc<ProgressTracker>>>,
}

impl Orchestrator {
    pub fn new(
        catalog: SectionCatalog,
        service: Arc<dyn ContentService>,
        history: Arc<dyn HistoryStore>,
        compiler: Arc<dyn DocumentCompiler>,
        config: OrchestratorConfig,
    ) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            detector: Arc::new(CompletionDetector::new(catalog.clone(), None)),
            catalog,
            service,
            history,
            compiler,
            config,
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Register a sink notified on every run finalization.
    pub fn with_finalization_sink(mut self, sink: Arc<dyn FinalizationSink>) -> Self {
        self.detector = Arc::new(CompletionDetector::new(self.catalog.clone(), Some(sink)));
        self
    }

    pub fn catalog(&self) -> &SectionCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate the selection, record a Pending run and start its scheduler pass.
    ///
    /// Returns as soon as the pass is spawned.
    pub async fn start_run<S: AsRef<str>>(
        &self,
        selected: &[S],
        context: RunContext,
    ) -> Result<RunId, ApiError> {
        let sections = self.catalog.select(selected)?;
        let run_id = RunId::generate();
        let run = GenerationRun::new(run_id.clone(), context.clone(), &sections);
        let tracker = ProgressTracker::new(run, self.history.clone());
        self.runs.write().insert(run_id.clone(), tracker.clone());

        info!(
            run_id = %run_id,
            document_type = %context.document_type,
            sections = sections.len(),
            "Run started"
        );
        self.spawn_pass(tracker, sections, context);
        Ok(run_id)
    }

    pub fn get_run_status(&self, run_id: &RunId) -> Result<RunStatusReport, ApiError> {
        if let Some(tracker) = self.live(run_id) {
            return Ok(RunStatusReport::from(&tracker.snapshot()));
        }
        self.history
            .get(run_id)?
            .map(|run| RunStatusReport::from(&run))
            .ok_or_else(|| ApiError::RunNotFound(run_id.clone()))
    }

    /// Re-dispatch every Failed section with a fresh retry budget.
    ///
    /// Returns the re-dispatched ids; empty (and no state change) when nothing had failed.
    pub async fn retry_failed(&self, run_id: &RunId) -> Result<Vec<SectionId>, ApiError> {
        let tracker = self.tracker_for(run_id)?;
        let reset = tracker.reset_failed()?;
        if reset.is_empty() {
            info!(run_id = %run_id, "No failed sections to retry");
            return Ok(reset);
        }
        let sections = self.catalog.select(&reset)?;

        info!(run_id = %run_id, sections = ?reset, "Retrying failed sections");
        let context = tracker.context();
        self.spawn_pass(tracker, sections, context);
        Ok(reset)
    }

    /// Compile the run's current Completed sections.
    ///
    /// Allowed before the run finishes. A compiler failure is returned as
    /// `ApiError::Compilation` and leaves the run status untouched.
    pub fn compile(&self, run_id: &RunId) -> Result<CompileResult, ApiError> {
        let tracker = self.tracker_for(run_id)?;
        let document = assemble_document(&tracker.snapshot(), &self.catalog);
        if document.is_empty() {
            return Err(ApiError::NothingToCompile(run_id.clone()));
        }

        match self.compiler.compile(&document) {
            Ok(artifact) => {
                let status = tracker.mark_compiled();
                info!(
                    run_id = %run_id,
                    path = %artifact.path.display(),
                    sections = artifact.section_count,
                    partial = document.is_partially_complete,
                    "Run compiled"
                );
                Ok(CompileResult {
                    document,
                    artifact,
                    status,
                })
            }
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "Compilation failed");
                Err(match err {
                    ApiError::Compilation(message) => ApiError::Compilation(message),
                    other => ApiError::Compilation(other.to_string()),
                })
            }
        }
    }

    /// Wait for the run to finalize, up to `timeout`.
    pub async fn wait_for_run(
        &self,
        run_id: &RunId,
        timeout: Duration,
    ) -> Result<RunStatusReport, ApiError> {
        let Some(tracker) = self.live(run_id) else {
            return self.get_run_status(run_id);
        };
        tokio::time::timeout(timeout, tracker.wait_finalized())
            .await
            .map_err(|_| ApiError::Timeout(run_id.clone()))?;
        if tracker.is_abandoned() {
            return Err(ApiError::RunNotFound(run_id.clone()));
        }
        Ok(RunStatusReport::from(&tracker.snapshot()))
    }

    /// Drop the live run context. In-flight attempts finish as no-ops.
    pub fn abandon_run(&self, run_id: &RunId) -> Result<(), ApiError> {
        let tracker = self
            .runs
            .write()
            .remove(run_id)
            .ok_or_else(|| ApiError::RunNotFound(run_id.clone()))?;
        tracker.abandon();
        info!(run_id = %run_id, "Run abandoned");
        Ok(())
    }

    /// Persisted runs, newest first.
    pub fn list_runs(&self) -> Result<Vec<RunStatusReport>, ApiError> {
        Ok(self
            .history
            .list()?
            .iter()
            .map(RunStatusReport::from)
            .collect())
    }

    fn live(&self, run_id: &RunId) -> Option<Arc<ProgressTracker>> {
        self.runs.read().get(run_id).cloned()
    }

    /// Live tracker, or one rehydrated from the History Store.
    fn tracker_for(&self, run_id: &RunId) -> Result<Arc<ProgressTracker>, ApiError> {
        if let Some(tracker) = self.live(run_id) {
            return Ok(tracker);
        }
        let run = self
            .history
            .get(run_id)?
            .ok_or_else(|| ApiError::RunNotFound(run_id.clone()))?;
        let mut runs = self.runs.write();
        let tracker = runs
            .entry(run_id.clone())
            .or_insert_with(|| ProgressTracker::new(run, self.history.clone()))
            .clone();
        Ok(tracker)
    }

    fn spawn_pass(
        &self,
        tracker: Arc<ProgressTracker>,
        sections: Vec<SectionDefinition>,
        context: RunContext,
    ) -> JoinHandle<PassSummary> {
        let worker = SectionWorker::new(
            self.service.clone(),
            tracker.clone(),
            self.detector.clone(),
            RetryPolicy::from(&self.config),
        );
        let scheduler = BatchScheduler::new(worker, tracker, self.config.batch_size);
        tokio::spawn(async move { scheduler.run_pass(sections, context).await })
    }
}
