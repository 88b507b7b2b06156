//! Report files produced from real engine runs

use permscan_core::{
    EngineConfig, ProbeFailure, ProbeOutcome, RelevanceMode, Report, ReportBuilder, ReportEngine,
    ReportRow, ReportWriter, ResourceRef, SearchPattern, Subject, WriteError,
};
use permscan_sinks::{
    ConsoleReportSink, CsvReportWriter, FileReportWriter, JsonReportWriter, ProgressTable,
};
use permscan_test_utils::{labels, resources, subject, StubDirectory, StubProbe};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn sample_report() -> Report {
    let mut builder = ReportBuilder::new(
        Subject::new("user@contoso.com"),
        SearchPattern::All,
        RelevanceMode::BroadOnly,
        2,
    );
    builder.record(
        0,
        ReportRow::new(
            ResourceRef::new("https://t/sites/a", "A"),
            ProbeOutcome::Granted(labels(&["Open", "ViewPages"])),
        ),
    );
    builder.record(
        1,
        ReportRow::new(
            ResourceRef::new("https://t/sites/b", "B"),
            ProbeOutcome::Failed("line one\nline two".into()),
        ),
    );
    builder.seal(Duration::from_millis(3))
}

fn read_csv(path: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn csv_has_header_and_full_summaries() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("report.csv");

    CsvReportWriter.write_final(&sample_report(), &dest).unwrap();

    assert_eq!(
        read_csv(&dest),
        vec![
            vec!["ResourceUrl", "Permissions for subject user@contoso.com"],
            vec!["https://t/sites/a", "Open, ViewPages"],
            vec!["https://t/sites/b", "line one\nline two"],
        ]
    );
}

#[test]
fn second_write_fails_and_keeps_first_file() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("report.csv");
    let report = sample_report();

    CsvReportWriter.write_final(&report, &dest).unwrap();
    let first = std::fs::read(&dest).unwrap();

    let err = CsvReportWriter.write_final(&report, &dest).unwrap_err();
    assert!(matches!(err, WriteError::DestinationExists(ref p) if p == &dest));
    assert_eq!(std::fs::read(&dest).unwrap(), first);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn existing_destination_is_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("report.json");
    std::fs::write(&dest, "operator notes").unwrap();
    let report = sample_report();

    for _ in 0..2 {
        let err = JsonReportWriter::default().write_final(&report, &dest).unwrap_err();
        assert!(err.is_destination_exists());
    }
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "operator notes");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn json_round_trips_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("report.json");
    let report = sample_report();

    JsonReportWriter::default().write_final(&report, &dest).unwrap();

    let parsed: Report = serde_json::from_str(&std::fs::read_to_string(&dest).unwrap()).unwrap();
    assert_eq!(parsed, report);
}

#[test]
fn file_writer_dispatches_on_extension() {
    let dir = tempfile::tempdir().unwrap();
    let report = sample_report();
    let writer = FileReportWriter::default();

    writer.write_final(&report, &dir.path().join("r.csv")).unwrap();
    writer.write_final(&report, &dir.path().join("r.json")).unwrap();

    let xlsx = dir.path().join("r.xlsx");
    let err = writer.write_final(&report, &xlsx).unwrap_err();
    assert!(matches!(err, WriteError::UnsupportedFormat(_)));
    assert!(!xlsx.exists());
}

#[tokio::test]
async fn engine_run_through_console_sink() {
    let sink = Arc::new(ConsoleReportSink::new(ProgressTable::new(Vec::new())));
    let engine = ReportEngine::new(
        Arc::new(StubDirectory::with_resources(resources(&["siteC", "siteA", "siteB"]))),
        Arc::new(
            StubProbe::granting(labels(&["Open", "ViewPages"]))
                .with_result("siteB", Ok(labels(&["Open"])))
                .with_result("siteC", Err(ProbeFailure::remote("timeout"))),
        ),
    )
    .with_config(EngineConfig::default())
    .with_progress(sink.clone());

    let report = engine
        .generate(&subject(), &SearchPattern::All, RelevanceMode::BroadOnly)
        .await
        .unwrap();
    assert_eq!(sink.progress().rows_seen(), 3);

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("report.csv");
    sink.write_final(&report, &dest).unwrap();

    let rows = read_csv(&dest);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], vec!["siteA", "Open, ViewPages"]);
    assert_eq!(rows[2], vec!["siteC", "timeout"]);
}
