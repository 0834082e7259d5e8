//! End-to-end runs through the orchestrator facade with scripted service outcomes.

use super::support::{permanent, transient, Harness, Reply, ScriptedService};
use folio::error::ApiError;
use folio::run::{RunOutcome, RunStatus};
use folio::section::SectionStatus;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn partial_run_compiles_completed_sections_in_catalog_order() {
    let ids = ["a", "b", "c", "d", "e"];
    let service = ScriptedService::new().always_fail("b").always_fail("d");
    let h = Harness::new(&ids, service);

    let run_id = h.start(&["e", "d", "c", "b", "a"]).await;
    let report = h.wait(&run_id).await;

    assert_eq!(report.status, RunStatus::Generated);
    assert!(report.is_partially_complete);
    assert_eq!(report.aggregate.completed, 3);
    assert_eq!(report.aggregate.failed, 2);
    let order: Vec<_> = report.sections.iter().map(|s| s.section_id.as_str()).collect();
    assert_eq!(order, ids.to_vec());
    for failed in ["b", "d"] {
        let state = report.sections.iter().find(|s| s.section_id == failed).unwrap();
        assert_eq!(state.status, SectionStatus::Failed);
        assert_eq!(state.retry_count, 2);
        assert!(state.last_error.is_some());
    }

    let compiled = h.orchestrator.compile(&run_id).unwrap();
    assert_eq!(compiled.document.section_ids(), vec!["a", "c", "e"]);
    assert!(compiled.document.is_partially_complete);
    assert_eq!(compiled.artifact.section_count, 3);
}

#[tokio::test(start_paused = true)]
async fn all_sections_failing_marks_run_failed() {
    let ids = ["a", "b", "c", "d"];
    let service = ScriptedService::new()
        .always_fail("a")
        .always_fail("b")
        .always_fail("c")
        .script("d", vec![permanent(), permanent(), permanent()]);
    let h = Harness::new(&ids, service);

    let run_id = h.start(&ids).await;
    let report = h.wait(&run_id).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert!(!report.is_partially_complete);
    assert_eq!(report.aggregate.failed, 4);
    assert_eq!(h.sink.reports()[0].outcome, RunOutcome::Failed);

    assert!(matches!(
        h.orchestrator.compile(&run_id),
        Err(ApiError::NothingToCompile(_))
    ));
    assert_eq!(
        h.orchestrator.get_run_status(&run_id).unwrap().status,
        RunStatus::Failed
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_section_never_retries_a_third_time() {
    let service = ScriptedService::new().always_fail("a");
    let h = Harness::new(&["a", "b"], service);

    let run_id = h.start(&["a", "b"]).await;
    h.wait(&run_id).await;
    assert_eq!(h.service.calls_for("a").len(), 3);

    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(h.service.calls_for("a").len(), 3);
    let report = h.orchestrator.get_run_status(&run_id).unwrap();
    let a = &report.sections[0];
    assert_eq!(a.status, SectionStatus::Failed);
    assert_eq!(a.retry_count, 2);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_recovers_after_retry_delay() {
    let service = ScriptedService::new().script("a", vec![transient(), Reply::Structured]);
    let h = Harness::new(&["a"], service);

    let run_id = h.start(&["a"]).await;
    let report = h.wait(&run_id).await;

    assert_eq!(report.status, RunStatus::Generated);
    assert!(!report.is_partially_complete);
    assert_eq!(report.sections[0].retry_count, 1);
    assert!(report.sections[0].last_error.is_none());

    let starts = h.service.calls_for("a");
    assert_eq!(starts.len(), 2);
    assert!(starts[1] - starts[0] >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn manual_retry_resets_budget_and_completes_run() {
    let service = ScriptedService::new().script(
        "a",
        vec![transient(), transient(), transient(), Reply::Structured],
    );
    let h = Harness::new(&["a", "b"], service);

    let run_id = h.start(&["a", "b"]).await;
    let first = h.wait(&run_id).await;
    assert!(first.is_partially_complete);
    assert_eq!(h.sink.count(), 1);

    let retried = h.orchestrator.retry_failed(&run_id).await.unwrap();
    assert_eq!(retried, vec!["a".to_string()]);

    let reopened = h.orchestrator.get_run_status(&run_id).unwrap();
    assert_eq!(reopened.status, RunStatus::Generating);
    assert!(!reopened.finalized);
    assert_eq!(reopened.sections[0].status, SectionStatus::Pending);
    assert_eq!(reopened.sections[0].retry_count, 0);

    let second = h.wait(&run_id).await;
    assert_eq!(second.status, RunStatus::Generated);
    assert!(!second.is_partially_complete);
    assert_eq!(second.aggregate.completed, 2);
    assert_eq!(h.sink.count(), 2);
    assert_eq!(h.service.calls_for("a").len(), 4);
    assert_eq!(h.service.calls_for("b").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn overlapping_retries_dispatch_each_section_once() {
    let service = ScriptedService::new()
        .with_latency(Duration::from_millis(100))
        .script("a", vec![transient(), transient(), transient(), Reply::Structured]);
    let h = Harness::new(&["a", "b"], service);

    let run_id = h.start(&["a", "b"]).await;
    h.wait(&run_id).await;
    assert_eq!(h.service.calls_for("a").len(), 3);

    let (first, second) = tokio::join!(
        h.orchestrator.retry_failed(&run_id),
        h.orchestrator.retry_failed(&run_id)
    );
    let mut retried = vec![first.unwrap(), second.unwrap()];
    retried.sort();
    assert_eq!(retried, vec![vec![], vec!["a".to_string()]]);

    let report = h.wait(&run_id).await;
    assert_eq!(report.status, RunStatus::Generated);
    assert_eq!(h.service.calls_for("a").len(), 4);
    assert_eq!(h.sink.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_without_failures_is_a_no_op() {
    let h = Harness::new(&["a", "b"], ScriptedService::new());
    let run_id = h.start(&["a", "b"]).await;
    let before = h.wait(&run_id).await;

    let retried = h.orchestrator.retry_failed(&run_id).await.unwrap();
    assert!(retried.is_empty());
    let after = h.orchestrator.get_run_status(&run_id).unwrap();
    assert_eq!(after.status, before.status);
    assert!(after.finalized);
    assert_eq!(h.service.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn simultaneous_completions_finalize_once() {
    let ids = ["a", "b", "c", "d", "e", "f"];
    let h = Harness::new(&ids, ScriptedService::new().with_latency(Duration::from_secs(1)));

    let run_id = h.start(&ids).await;
    h.wait(&run_id).await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(h.sink.count(), 1);
    let report = &h.sink.reports()[0];
    assert_eq!(report.outcome, RunOutcome::Complete);
    assert_eq!(report.document.ordered_sections.len(), 6);
    let finalized_snapshots = h
        .history
        .snapshots()
        .iter()
        .filter(|s| s.finalized)
        .count();
    assert_eq!(finalized_snapshots, 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_run_absorbs_late_completions() {
    let h = Harness::new(
        &["a", "b"],
        ScriptedService::new().with_latency(Duration::from_secs(10)),
    );
    let run_id = h.start(&["a", "b"]).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    h.orchestrator.abandon_run(&run_id).unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(h.sink.count(), 0);
    let stored = h.orchestrator.get_run_status(&run_id).unwrap();
    assert!(!stored.finalized);
    assert_eq!(stored.aggregate.completed, 0);
    assert_eq!(stored.aggregate.generating, 2);
    assert!(matches!(
        h.orchestrator.abandon_run(&run_id),
        Err(ApiError::RunNotFound(_))
    ));
}
