//! CLI route: single route table and CLI context. Builds an orchestrator per command and
//! hands results to presentation.

use crate::catalog::SectionCatalog;
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_catalog_text, format_compile_result_text, format_history_text,
    format_run_status_text,
};
use crate::config::{ConfigLoader, FolioConfig};
use crate::error::ApiError;
use crate::history::{HistoryStore, SledHistoryStore};
use crate::orchestrator::{Orchestrator, RunStatusReport};
use crate::provider::{ContentService, HttpContentService, StaticContentService};
use crate::report::{DocumentCompiler, JsonCompiler, MarkdownCompiler, OutputFormat};
use crate::types::{RunContext, RunId};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Runtime context for CLI execution: workspace, loaded config, and the history store.
pub struct CliContext {
    workspace_root: PathBuf,
    config: FolioConfig,
    history: Arc<SledHistoryStore>,
}

impl CliContext {
    /// Create the context from a workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_config(workspace_root, config)
    }

    pub fn with_config(workspace_root: PathBuf, config: FolioConfig) -> Result<Self, ApiError> {
        let history_path = config
            .storage
            .resolve(&workspace_root, &config.storage.history_path);
        let history = Arc::new(SledHistoryStore::open(&history_path)?);
        Ok(Self {
            workspace_root,
            config,
            history,
        })
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = self.execute_inner(command).await;
        if let Err(e) = self.history.flush() {
            warn!(error = %e, "Failed to flush run history");
        }
        info!(
            command = command.name(),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Catalog { doc_type, format } => {
                let catalog = self.catalog(doc_type)?;
                if format == "json" {
                    return to_json(&catalog);
                }
                Ok(format_catalog_text(&catalog))
            }
            Commands::Generate {
                doc_type,
                sections,
                offline,
                requester,
                wait_secs,
                format,
            } => {
                let orchestrator =
                    self.orchestrator(doc_type, *offline, OutputFormat::Markdown)?;
                let selected = if sections.is_empty() {
                    orchestrator.catalog().ids()
                } else {
                    sections.clone()
                };
                let mut context = RunContext::new(doc_type.clone());
                if let Some(requester) = requester {
                    context = context.with_requester(requester.clone());
                }
                let run_id = orchestrator.start_run(&selected, context).await?;
                let report = orchestrator
                    .wait_for_run(&run_id, Duration::from_secs(*wait_secs))
                    .await?;
                render_status(&report, format)
            }
            Commands::Status { run, format } => {
                let run_id = parse_run_id(run)?;
                let run = self
                    .history
                    .get(&run_id)?
                    .ok_or(ApiError::RunNotFound(run_id))?;
                render_status(&RunStatusReport::from(&run), format)
            }
            Commands::Retry {
                run,
                offline,
                wait_secs,
            } => {
                let run_id = parse_run_id(run)?;
                let doc_type = self.document_type_of(&run_id)?;
                let orchestrator =
                    self.orchestrator(&doc_type, *offline, OutputFormat::Markdown)?;
                let retried = orchestrator.retry_failed(&run_id).await?;
                if retried.is_empty() {
                    return Ok(format!("Run {} has no failed sections.", run_id));
                }
                let report = orchestrator
                    .wait_for_run(&run_id, Duration::from_secs(*wait_secs))
                    .await?;
                Ok(format_run_status_text(&report))
            }
            Commands::Compile { run, format } => {
                let run_id = parse_run_id(run)?;
                let format: OutputFormat = format.parse().map_err(ApiError::ConfigError)?;
                let doc_type = self.document_type_of(&run_id)?;
                let orchestrator = self.orchestrator(&doc_type, true, format)?;
                let result = orchestrator.compile(&run_id)?;
                Ok(format_compile_result_text(&result))
            }
            Commands::History { format } => {
                let runs: Vec<RunStatusReport> = self
                    .history
                    .list()?
                    .iter()
                    .map(RunStatusReport::from)
                    .collect();
                if format == "json" {
                    return to_json(&runs);
                }
                Ok(format_history_text(&runs))
            }
        }
    }

    fn catalog(&self, doc_type: &str) -> Result<SectionCatalog, ApiError> {
        let dir = self
            .config
            .storage
            .resolve(&self.workspace_root, &self.config.storage.catalog_dir);
        SectionCatalog::resolve(doc_type, Some(&dir))
    }

    fn document_type_of(&self, run_id: &RunId) -> Result<String, ApiError> {
        self.history
            .get(run_id)?
            .map(|run| run.context.document_type)
            .ok_or_else(|| ApiError::RunNotFound(run_id.clone()))
    }

    fn orchestrator(
        &self,
        doc_type: &str,
        offline: bool,
        format: OutputFormat,
    ) -> Result<Orchestrator, ApiError> {
        let catalog = self.catalog(doc_type)?;
        let service: Arc<dyn ContentService> = if offline {
            Arc::new(StaticContentService)
        } else {
            Arc::new(HttpContentService::new(&self.config.provider)?)
        };
        let output_dir = self
            .config
            .storage
            .resolve(&self.workspace_root, &self.config.storage.output_dir);
        let compiler: Arc<dyn DocumentCompiler> = match format {
            OutputFormat::Markdown => Arc::new(MarkdownCompiler::new(output_dir)),
            OutputFormat::Json => Arc::new(JsonCompiler::new(output_dir)),
        };
        Ok(Orchestrator::new(
            catalog,
            service,
            self.history.clone(),
            compiler,
            self.config.orchestrator.clone(),
        ))
    }
}

fn parse_run_id(raw: &str) -> Result<RunId, ApiError> {
    raw.parse().map_err(ApiError::ConfigError)
}

fn render_status(report: &RunStatusReport, format: &str) -> Result<String, ApiError> {
    match format {
        "json" => to_json(report),
        _ => Ok(format_run_status_text(report)),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(crate::error::StorageError::from(e)))
}
