//! Shared fixtures for integration tests: a scripted content service, a recording
//! history store, a counting finalization sink and orchestrator builders.

use async_trait::async_trait;
use folio::catalog::{SectionCatalog, SectionDefinition, SectionPriority};
use folio::config::OrchestratorConfig;
use folio::error::{ApiError, ServiceError, StorageError};
use folio::history::{HistoryStore, MemoryHistoryStore};
use folio::orchestrator::{FinalReport, FinalizationSink, Orchestrator};
use folio::provider::{ContentService, GeneratedContent};
use folio::report::{CompiledArtifact, DocumentCompiler, DocumentStructure, MarkdownCompiler};
use folio::run::GenerationRun;
use folio::types::{RunContext, RunId};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

/// What the scripted service answers for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Structured,
    DisplayOnly,
    Fail(ServiceError),
}

pub fn transient() -> Reply {
    Reply::Fail(ServiceError::Transient("upstream 503".to_string()))
}

pub fn permanent() -> Reply {
    Reply::Fail(ServiceError::Permanent {
        status: 400,
        message: "bad request".to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub section_id: String,
    pub started: Instant,
}

/// Content service answering from per-section scripts; unscripted calls succeed.
pub struct ScriptedService {
    latency: Duration,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<CallRecord>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(100),
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn script(self, section_id: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .insert(section_id.to_string(), replies.into());
        self
    }

    /// Every call fails for this section.
    pub fn always_fail(self, section_id: &str) -> Self {
        self.script(section_id, vec![transient(); 16])
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, section_id: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.section_id == section_id)
            .map(|c| c.started)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentService for ScriptedService {
    async fn generate(
        &self,
        section: &SectionDefinition,
        _context: &RunContext,
    ) -> Result<GeneratedContent, ServiceError> {
        self.calls.lock().push(CallRecord {
            section_id: section.id.clone(),
            started: Instant::now(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let reply = self
            .scripts
            .lock()
            .get_mut(&section.id)
            .and_then(|q| q.pop_front())
            .unwrap_or(Reply::Structured);
        match reply {
            Reply::Structured => Ok(GeneratedContent::new(
                format!("{} body", section.title),
                json!({"section": section.id}),
            )),
            Reply::DisplayOnly => Ok(GeneratedContent::display_only(format!(
                "{} plain text",
                section.title
            ))),
            Reply::Fail(err) => Err(err),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// History store that keeps every snapshot it was given, in write order.
#[derive(Default)]
pub struct RecordingHistory {
    inner: MemoryHistoryStore,
    snapshots: Mutex<Vec<GenerationRun>>,
}

impl RecordingHistory {
    pub fn snapshots(&self) -> Vec<GenerationRun> {
        self.snapshots.lock().clone()
    }
}

impl HistoryStore for RecordingHistory {
    fn snapshot(&self, run_id: &RunId, run: &GenerationRun) -> Result<(), StorageError> {
        self.snapshots.lock().push(run.clone());
        self.inner.snapshot(run_id, run)
    }

    fn get(&self, run_id: &RunId) -> Result<Option<GenerationRun>, StorageError> {
        self.inner.get(run_id)
    }

    fn list(&self) -> Result<Vec<GenerationRun>, StorageError> {
        self.inner.list()
    }

    fn delete(&self, run_id: &RunId) -> Result<(), StorageError> {
        self.inner.delete(run_id)
    }
}

#[derive(Default)]
pub struct CountingSink {
    reports: Mutex<Vec<FinalReport>>,
}

impl CountingSink {
    pub fn count(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn reports(&self) -> Vec<FinalReport> {
        self.reports.lock().clone()
    }
}

impl FinalizationSink for CountingSink {
    fn on_finalized(&self, report: &FinalReport) {
        self.reports.lock().push(report.clone());
    }
}

/// Compiler that fails while `failing` is set, then delegates to Markdown output.
pub struct FlakyCompiler {
    pub failing: AtomicBool,
    inner: MarkdownCompiler,
    pub attempts: AtomicUsize,
}

impl FlakyCompiler {
    pub fn new(dir: &TempDir) -> Self {
        Self {
            failing: AtomicBool::new(true),
            inner: MarkdownCompiler::new(dir.path()),
            attempts: AtomicUsize::new(0),
        }
    }
}

impl DocumentCompiler for FlakyCompiler {
    fn compile(&self, document: &DocumentStructure) -> Result<CompiledArtifact, ApiError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::Compilation("renderer unavailable".to_string()));
        }
        self.inner.compile(document)
    }
}

pub fn catalog(ids: &[&str]) -> SectionCatalog {
    let sections = ids
        .iter()
        .map(|id| SectionDefinition {
            id: id.to_string(),
            title: format!("Section {}", id.to_uppercase()),
            category: "general".to_string(),
            priority: SectionPriority::Medium,
            estimated_size: 300,
            prompt: None,
        })
        .collect();
    SectionCatalog::new("test-report", sections).unwrap()
}

pub fn fast_config(batch_size: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        batch_size,
        ..OrchestratorConfig::default()
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub service: Arc<ScriptedService>,
    pub history: Arc<RecordingHistory>,
    pub sink: Arc<CountingSink>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(ids: &[&str], service: ScriptedService) -> Self {
        Self::with_config(ids, service, OrchestratorConfig::default())
    }

    pub fn with_config(ids: &[&str], service: ScriptedService, config: OrchestratorConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let compiler = Arc::new(MarkdownCompiler::new(dir.path()));
        Self::build(ids, service, config, compiler, dir)
    }

    pub fn build(
        ids: &[&str],
        service: ScriptedService,
        config: OrchestratorConfig,
        compiler: Arc<dyn DocumentCompiler>,
        dir: TempDir,
    ) -> Self {
        let service = Arc::new(service);
        let history = Arc::new(RecordingHistory::default());
        let sink = Arc::new(CountingSink::default());
        let orchestrator = Orchestrator::new(
            catalog(ids),
            service.clone(),
            history.clone(),
            compiler,
            config,
        )
        .with_finalization_sink(sink.clone());
        Self {
            orchestrator,
            service,
            history,
            sink,
            dir,
        }
    }

    pub async fn start(&self, ids: &[&str]) -> RunId {
        self.orchestrator
            .start_run(ids, RunContext::new("test-report").with_requester("integration"))
            .await
            .unwrap()
    }

    pub async fn wait(&self, run_id: &RunId) -> folio::orchestrator::RunStatusReport {
        self.orchestrator
            .wait_for_run(run_id, Duration::from_secs(600))
            .await
            .unwrap()
    }
}
