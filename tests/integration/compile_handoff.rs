//! Document compiler hand-off: failures never touch the run status, compilation can be
//! repeated and can run before the run finishes.

use super::support::{Harness, Reply, ScriptedService, FlakyCompiler};
use folio::config::OrchestratorConfig;
use folio::error::ApiError;
use folio::report::{DocumentStructure, JsonCompiler, MarkdownCompiler};
use folio::run::RunStatus;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test(start_paused = true)]
async fn compiler_failure_keeps_generated_status() {
    let dir = TempDir::new().unwrap();
    let compiler = Arc::new(FlakyCompiler::new(&dir));
    let h = Harness::build(
        &["a", "b"],
        ScriptedService::new(),
        OrchestratorConfig::default(),
        compiler.clone(),
        dir,
    );
    let run_id = h.start(&["a", "b"]).await;
    h.wait(&run_id).await;

    let err = h.orchestrator.compile(&run_id).unwrap_err();
    assert!(matches!(err, ApiError::Compilation(ref m) if m.contains("renderer unavailable")));
    let status = h.orchestrator.get_run_status(&run_id).unwrap();
    assert_eq!(status.status, RunStatus::Generated);
    assert!(!status.compiled);

    compiler.failing.store(false, Ordering::SeqCst);
    let compiled = h.orchestrator.compile(&run_id).unwrap();
    assert_eq!(compiled.status, RunStatus::Compiled);
    assert_eq!(compiler.attempts.load(Ordering::SeqCst), 2);
    let status = h.orchestrator.get_run_status(&run_id).unwrap();
    assert_eq!(status.status, RunStatus::Compiled);
    assert!(status.compiled);
}

#[tokio::test(start_paused = true)]
async fn display_only_sections_compile_as_fallback() {
    let service = ScriptedService::new().script("a", vec![Reply::DisplayOnly]);
    let h = Harness::new(&["a", "b"], service);
    let run_id = h.start(&["a", "b"]).await;
    let report = h.wait(&run_id).await;
    assert!(report.sections[0].is_fallback());

    let compiled = h.orchestrator.compile(&run_id).unwrap();
    let a = &compiled.document.ordered_sections[0];
    assert_eq!(a.content, "Section A plain text");
    assert!(a.structured_data.is_none());
    assert!(compiled.document.ordered_sections[1].structured_data.is_some());

    let markdown = std::fs::read_to_string(&compiled.artifact.path).unwrap();
    assert!(markdown.contains("## Section A"));
    assert!(markdown.contains("Section A plain text"));
    assert!(!markdown.contains("Partial document"));
}

#[tokio::test(start_paused = true)]
async fn compile_projects_in_progress_run() {
    let ids = ["a", "b", "c", "d", "e", "f"];
    let h = Harness::new(&ids, ScriptedService::new().with_latency(Duration::from_secs(1)));
    let run_id = h.start(&ids).await;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let compiled = h.orchestrator.compile(&run_id).unwrap();
    assert_eq!(compiled.document.section_ids(), vec!["a", "b", "c"]);
    assert!(compiled.document.is_partially_complete);
    assert_eq!(compiled.status, RunStatus::Generating);

    let report = h.wait(&run_id).await;
    assert_eq!(report.status, RunStatus::Generated);
    let again = h.orchestrator.compile(&run_id).unwrap();
    assert_eq!(again.document.ordered_sections.len(), 6);
    assert!(!again.document.is_partially_complete);
    assert_eq!(again.status, RunStatus::Compiled);
}

#[tokio::test(start_paused = true)]
async fn json_compiler_writes_document_structure() {
    let dir = TempDir::new().unwrap();
    let compiler = Arc::new(JsonCompiler::new(dir.path().join("out")));
    let h = Harness::build(
        &["a", "b", "c"],
        ScriptedService::new().always_fail("b"),
        OrchestratorConfig::default(),
        compiler,
        dir,
    );
    let run_id = h.start(&["a", "b", "c"]).await;
    h.wait(&run_id).await;

    let compiled = h.orchestrator.compile(&run_id).unwrap();
    let raw = std::fs::read_to_string(&compiled.artifact.path).unwrap();
    let parsed: DocumentStructure = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.section_ids(), vec!["a", "c"]);
    assert_eq!(parsed.failed_count, 1);
    assert!(parsed.is_partially_complete);
}

#[test]
fn markdown_render_is_pure() {
    let document = DocumentStructure {
        run_id: "run-x".into(),
        document_type: "test-report".to_string(),
        title: "test report".to_string(),
        is_partially_complete: false,
        completed_count: 0,
        failed_count: 0,
        total_count: 0,
        ordered_sections: vec![],
    };
    let first = MarkdownCompiler::render(&document).unwrap();
    let second = MarkdownCompiler::render(&document).unwrap();
    assert_eq!(first, second);
    assert!(first.starts_with("# Test Report"));
}
