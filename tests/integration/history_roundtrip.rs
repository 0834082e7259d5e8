//! History Store persistence: reload fidelity, rehydration for manual retry, listing.

use super::support::{catalog, transient, Harness, Reply, ScriptedService};
use folio::config::OrchestratorConfig;
use folio::history::{HistoryStore, MemoryHistoryStore, SledHistoryStore};
use folio::orchestrator::Orchestrator;
use folio::report::MarkdownCompiler;
use folio::run::RunStatus;
use folio::section::SectionStatus;
use folio::types::RunContext;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test(start_paused = true)]
async fn reloaded_snapshot_matches_live_state() {
    let ids = ["a", "b", "c"];
    let service = ScriptedService::new()
        .script("a", vec![transient(), Reply::Structured])
        .always_fail("b");
    let h = Harness::new(&ids, service);

    let run_id = h.start(&ids).await;
    let live = h.wait(&run_id).await;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history");
    {
        let store = SledHistoryStore::open(&path).unwrap();
        let run = h.history.get(&run_id).unwrap().unwrap();
        store.snapshot(&run_id, &run).unwrap();
        store.flush().unwrap();
    }
    let reopened = SledHistoryStore::open(&path).unwrap();
    let loaded = reopened.get(&run_id).unwrap().unwrap();

    assert_eq!(loaded.aggregate(), live.aggregate);
    assert_eq!(loaded.status, live.status);
    for state in &live.sections {
        let stored = loaded.section(&state.section_id).unwrap();
        assert_eq!(stored.status, state.status);
        assert_eq!(stored.retry_count, state.retry_count);
        assert_eq!(stored.structured_data, state.structured_data);
    }
}

#[tokio::test(start_paused = true)]
async fn retry_rehydrates_run_from_history() {
    let history = MemoryHistoryStore::shared();
    let dir = TempDir::new().unwrap();
    let ids = ["a", "b"];

    let first = Orchestrator::new(
        catalog(&ids),
        Arc::new(ScriptedService::new().always_fail("b")),
        history.clone(),
        Arc::new(MarkdownCompiler::new(dir.path())),
        OrchestratorConfig::default(),
    );
    let run_id = first
        .start_run(&ids, RunContext::new("test-report"))
        .await
        .unwrap();
    let report = first
        .wait_for_run(&run_id, Duration::from_secs(120))
        .await
        .unwrap();
    assert!(report.is_partially_complete);
    drop(first);

    let second = Orchestrator::new(
        catalog(&ids),
        Arc::new(ScriptedService::new()),
        history.clone(),
        Arc::new(MarkdownCompiler::new(dir.path())),
        OrchestratorConfig::default(),
    );
    let retried = second.retry_failed(&run_id).await.unwrap();
    assert_eq!(retried, vec!["b".to_string()]);
    let report = second
        .wait_for_run(&run_id, Duration::from_secs(120))
        .await
        .unwrap();
    assert_eq!(report.status, RunStatus::Generated);
    assert!(!report.is_partially_complete);
    assert!(report
        .sections
        .iter()
        .all(|s| s.status == SectionStatus::Completed));

    let stored = history.get(&run_id).unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Generated);
    assert_eq!(stored.section("b").unwrap().retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn list_runs_returns_every_run() {
    let h = Harness::new(&["a", "b"], ScriptedService::new());
    let first = h.start(&["a"]).await;
    h.wait(&first).await;
    let second = h.start(&["a", "b"]).await;
    h.wait(&second).await;

    let runs = h.orchestrator.list_runs().unwrap();
    assert_eq!(runs.len(), 2);
    let ids: Vec<_> = runs.iter().map(|r| r.run_id.clone()).collect();
    assert!(ids.contains(&first));
    assert!(ids.contains(&second));
    assert!(runs.iter().all(|r| r.status == RunStatus::Generated));
}
