//! End-to-end behaviour of `ReportEngine` against scripted collaborators

use permscan_core::prelude::*;
use permscan_core::{DirectoryError, ProbeFailure};
use permscan_test_utils::{labels, resources, sites, subject, RecordingSink, SinkEvent, StubDirectory, StubProbe};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct Harness {
    directory: Arc<StubDirectory>,
    probe: Arc<StubProbe>,
    sink: Arc<RecordingSink>,
    engine: ReportEngine,
}

fn harness(directory: StubDirectory, probe: StubProbe, config: EngineConfig) -> Harness {
    let directory = Arc::new(directory);
    let probe = Arc::new(probe);
    let sink = Arc::new(RecordingSink::new());
    let engine = ReportEngine::new(directory.clone(), probe.clone())
        .with_progress(sink.clone())
        .with_config(config);
    Harness {
        directory,
        probe,
        sink,
        engine,
    }
}

fn ids(report: &Report) -> Vec<String> {
    report.resource_ids().map(str::to_string).collect()
}

#[tokio::test]
async fn broad_grants_are_all_reported_in_order() {
    let all = sites(12);
    let mut shuffled = all.clone();
    shuffled.reverse();

    let h = harness(
        StubDirectory::with_resources(shuffled),
        StubProbe::granting(labels(&["Open", "ViewPages", "AddListItems"])),
        EngineConfig::default(),
    );

    for mode in [RelevanceMode::BroadOnly, RelevanceMode::All] {
        let report = h.engine.generate(&subject(), &SearchPattern::All, mode).await.unwrap();
        let expected: Vec<String> = all.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids(&report), expected);
        assert_eq!(report.rows()[0].summary, "Open, ViewPages, AddListItems");
    }
}

#[tokio::test]
async fn single_label_grants_depend_on_mode() {
    let h = harness(
        StubDirectory::with_resources(sites(7)),
        StubProbe::granting(labels(&["Open"])),
        EngineConfig::default(),
    );

    let broad = h
        .engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::BroadOnly)
        .await
        .unwrap();
    assert!(broad.is_empty());
    assert_eq!(broad.stats().considered, 7);
    assert_eq!(broad.stats().dropped(), 7);

    let all = h
        .engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::All)
        .await
        .unwrap();
    assert_eq!(all.len(), 7);

    let strict = h
        .engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::AtLeast(1))
        .await
        .unwrap();
    assert_eq!(strict.len(), 7);
}

#[tokio::test]
async fn failed_probe_is_reported_under_every_mode() {
    let all = sites(5);
    let broken = all[2].id.clone();

    let h = harness(
        StubDirectory::with_resources(all),
        StubProbe::granting(labels(&["Open"]))
            .with_result(&broken, Err(ProbeFailure::remote("(429) Too Many Requests"))),
        EngineConfig::default(),
    );

    for mode in [
        RelevanceMode::BroadOnly,
        RelevanceMode::All,
        RelevanceMode::AtLeast(10),
    ] {
        let report = h.engine.generate(&subject(), &SearchPattern::All, mode).await.unwrap();
        let row = report.row(&broken).expect("failed row kept");
        assert_eq!(
            row.outcome,
            ProbeOutcome::Failed("(429) Too Many Requests".into())
        );
    }
}

#[tokio::test]
async fn directory_failure_touches_nothing() {
    let h = harness(
        StubDirectory::failing(DirectoryError::Enumeration {
            fetched: 300,
            reason: "(401) Unauthorized".into(),
        }),
        StubProbe::granting(labels(&["Open", "ViewPages"])),
        EngineConfig::default(),
    );

    let err = h
        .engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::All)
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::Directory(_)));
    assert!(h.sink.is_empty());
    assert_eq!(h.probe.calls(), 0);
    assert_eq!(h.directory.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_limit() {
    for limit in [1usize, 4, 100] {
        let h = harness(
            StubDirectory::with_resources(sites(50)),
            StubProbe::granting(labels(&["Open", "ViewPages"])).with_delay(Duration::from_millis(20)),
            EngineConfig::new().with_concurrency(limit),
        );

        let report = h
            .engine
            .generate(&subject(), &SearchPattern::All, RelevanceMode::All)
            .await
            .unwrap();

        assert_eq!(report.len(), 50);
        assert_eq!(h.probe.calls(), 50);
        assert!(h.probe.peak_concurrency() <= limit);
        assert_eq!(h.probe.peak_concurrency(), limit.min(50));
        assert_eq!(h.engine.last_pool_stats().peak_active, limit.min(50));
    }
}

#[tokio::test]
async fn sequential_run_probes_in_resolved_order() {
    let h = harness(
        StubDirectory::with_resources(resources(&["c", "a", "b"])),
        StubProbe::granting(labels(&["Open", "ViewPages"])),
        EngineConfig::new().with_concurrency(1),
    );

    h.engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::All)
        .await
        .unwrap();
    assert_eq!(h.probe.seen(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn three_site_scenario() {
    let h = harness(
        StubDirectory::with_resources(resources(&["siteC", "siteA", "siteB"])),
        StubProbe::granting(labels(&["Open", "ViewPages"]))
            .with_result("siteB", Ok(labels(&[])))
            .with_result("siteC", Err(ProbeFailure::remote("timeout"))),
        EngineConfig::default(),
    );

    let report = h
        .engine
        .generate(&Subject::new("user@x"), &SearchPattern::All, RelevanceMode::BroadOnly)
        .await
        .unwrap();

    assert_eq!(ids(&report), vec!["siteA", "siteC"]);
    assert_eq!(report.rows()[0].summary, "Open, ViewPages");
    assert_eq!(report.rows()[1].outcome, ProbeOutcome::Failed("timeout".into()));
    assert_eq!(report.stats().empty, 1);

    let mut lines = h.sink.rows();
    lines.sort();
    assert_eq!(
        lines,
        vec![
            ("siteA".to_string(), "Open, ViewPages".to_string()),
            ("siteB".to_string(), String::new()),
            ("siteC".to_string(), "timeout".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn progress_follows_completion_order_report_follows_id_order() {
    let h = harness(
        StubDirectory::with_resources(resources(&["a", "b", "c"])),
        StubProbe::granting(labels(&["Open", "ViewPages"]))
            .with_delay_for("a", Duration::from_millis(30))
            .with_delay_for("b", Duration::from_millis(20))
            .with_delay_for("c", Duration::from_millis(10)),
        EngineConfig::new().with_concurrency(3),
    );

    let report = h
        .engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::All)
        .await
        .unwrap();

    let live: Vec<String> = h.sink.rows().into_iter().map(|(id, _)| id).collect();
    assert_eq!(live, vec!["c", "b", "a"]);
    assert_eq!(ids(&report), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn live_lines_are_truncated_report_keeps_full_text() {
    let trace = format!(
        "System.Net.WebException: {}\n   at Microsoft.SharePoint.Client.ClientRequest.Execute()",
        "x".repeat(80)
    );
    let h = harness(
        StubDirectory::with_resources(resources(&["siteA"])),
        StubProbe::failing(ProbeFailure::remote(trace.clone())),
        EngineConfig::default(),
    );

    let report = h
        .engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::BroadOnly)
        .await
        .unwrap();

    let (_, line) = &h.sink.rows()[0];
    assert_eq!(line.chars().count(), 63);
    assert!(line.ends_with("..."));
    assert!(!line.contains('\n'));
    assert_eq!(report.rows()[0].summary, trace);
}

#[tokio::test]
async fn header_and_footer_bracket_the_rows() {
    let h = harness(
        StubDirectory::with_resources(sites(3)),
        StubProbe::granting(labels(&["Open"])),
        EngineConfig::default(),
    );

    let report = h
        .engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::BroadOnly)
        .await
        .unwrap();

    let events = h.sink.events();
    assert_eq!(events.len(), 5);
    assert_eq!(
        events[0],
        SinkEvent::Begin {
            subject: "user@contoso.com".into(),
            resolved: 3
        }
    );
    assert_eq!(events[4], SinkEvent::End(*report.stats()));
}

#[tokio::test]
async fn duplicate_ids_are_probed_once() {
    let h = harness(
        StubDirectory::with_resources(resources(&["b", "a", "b", "a"])),
        StubProbe::granting(labels(&["Open", "ViewPages"])),
        EngineConfig::default(),
    );

    let report = h
        .engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::All)
        .await
        .unwrap();
    assert_eq!(ids(&report), vec!["a", "b"]);
    assert_eq!(h.probe.calls(), 2);
    assert_eq!(report.stats().resolved, 2);
}

#[tokio::test]
async fn empty_resolution_yields_empty_report() {
    let h = harness(
        StubDirectory::with_resources(Vec::new()),
        StubProbe::granting(labels(&["Open", "ViewPages"])),
        EngineConfig::default(),
    );

    let report = h
        .engine
        .generate(&subject(), &"https://tenant/sites/none".into(), RelevanceMode::All)
        .await
        .unwrap();
    assert!(report.is_empty());
    assert_eq!(h.sink.events().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_probe_becomes_timeout_row() {
    let h = harness(
        StubDirectory::with_resources(resources(&["fast", "slow"])),
        StubProbe::granting(labels(&["Open", "ViewPages"]))
            .with_delay_for("slow", Duration::from_secs(120)),
        EngineConfig::new().with_probe_timeout(Some(Duration::from_secs(5))),
    );

    let report = h
        .engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::BroadOnly)
        .await
        .unwrap();

    assert_eq!(report.len(), 2);
    assert_eq!(
        report.row("slow").unwrap().outcome,
        ProbeOutcome::Failed("probe timed out after 5000ms".into())
    );
    assert_eq!(h.engine.last_pool_stats().timed_out, 1);
}

#[tokio::test]
async fn panicking_probe_becomes_failed_row() {
    let h = harness(
        StubDirectory::with_resources(resources(&["a", "b", "c"])),
        StubProbe::granting(labels(&["Open", "ViewPages"])).panicking_on("b"),
        EngineConfig::default(),
    );

    let report = h
        .engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::BroadOnly)
        .await
        .unwrap();

    assert_eq!(ids(&report), vec!["a", "b", "c"]);
    match &report.row("b").unwrap().outcome {
        ProbeOutcome::Failed(detail) => {
            assert!(detail.starts_with("probe panicked"), "{detail}");
            assert!(detail.contains("stub probe panic on b"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn cancellation_returns_no_report() {
    let h = harness(
        StubDirectory::with_resources(resources(&["a", "b", "stuck"])),
        StubProbe::granting(labels(&["Open", "ViewPages"])).hanging_on("stuck"),
        EngineConfig::default(),
    );

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = h
        .engine
        .generate_with_cancel(&subject(), &SearchPattern::All, RelevanceMode::All, token)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(!err.is_retryable());
    let events = h.sink.events();
    assert!(!events.iter().any(|e| matches!(e, SinkEvent::End(_))));
}

#[tokio::test]
async fn zero_concurrency_is_rejected_before_resolution() {
    let h = harness(
        StubDirectory::with_resources(sites(3)),
        StubProbe::granting(labels(&["Open", "ViewPages"])),
        EngineConfig::new().with_concurrency(0),
    );

    let err = h
        .engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::InvalidConfig(_)));
    assert_eq!(h.directory.calls(), 0);
}

fn run_paused<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
        .block_on(fut)
}

proptest! {
    #[test]
    fn prop_report_is_sorted_and_unique(
        entries in proptest::collection::vec((0..30usize, 0..50u64), 0..40),
        limit in 1..8usize,
    ) {
        let ids_in: Vec<String> = entries
            .iter()
            .map(|(n, _)| format!("https://tenant/sites/{n:02}"))
            .collect();

        let mut probe = StubProbe::granting(labels(&["Open", "ViewPages"]));
        for (id, (_, delay)) in ids_in.iter().zip(&entries) {
            probe = probe.with_delay_for(id, Duration::from_millis(*delay));
        }

        let refs: Vec<&str> = ids_in.iter().map(String::as_str).collect();
        let h = harness(
            StubDirectory::with_resources(resources(&refs)),
            probe,
            EngineConfig::new().with_concurrency(limit),
        );

        let report = run_paused(h.engine.generate(&subject(), &SearchPattern::All, RelevanceMode::All))
            .unwrap();

        let mut expected = ids_in.clone();
        expected.sort();
        expected.dedup();

        prop_assert_eq!(ids(&report), expected.clone());
        prop_assert_eq!(h.probe.calls(), expected.len());
        prop_assert!(h.probe.peak_concurrency() <= limit);
    }
}
