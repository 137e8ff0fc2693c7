mod common;

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{StubClient, Step, empty, page};
use murmur_harvest::{
    HarvestError, HarvestSettings, Harvester, Pacing, Record, RecordSink, StopReason,
};
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct Outputs {
    _dir: TempDir,
    csv: PathBuf,
    json: PathBuf,
}

impl Outputs {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("out").join("tweets.csv");
        let json = dir.path().join("out").join("tweets.json");
        Self { _dir: dir, csv, json }
    }

    fn sink(&self) -> RecordSink {
        RecordSink::open(&self.csv, &self.json).unwrap()
    }

    fn json_records(&self) -> Vec<Record> {
        serde_json::from_slice(&std::fs::read(&self.json).unwrap()).unwrap()
    }

    fn csv_rows(&self) -> usize {
        csv_rows(&self.csv)
    }
}

fn csv_rows(path: &Path) -> usize {
    csv::Reader::from_path(path).unwrap().records().count()
}

fn settings(target: u64) -> HarvestSettings {
    HarvestSettings {
        pacing: Pacing::new(Duration::ZERO, Duration::ZERO),
        ..HarvestSettings::new("rust", target)
    }
}

#[tokio::test(start_paused = true)]
async fn stops_once_target_is_reached() {
    common::init_test_tracing();
    let out = Outputs::new();
    let client = StubClient::new(vec![
        Step::Page(page(0, 3, Some("c1"))),
        Step::Page(page(3, 3, Some("c2"))),
        Step::Page(empty(None)),
    ]);

    let report = Harvester::new(&client, settings(5), out.sink(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert_eq!(report.stop, StopReason::TargetReached);
    assert_eq!(report.pages, 2);
    assert_eq!(report.records, 6);
    assert!(report.stats.max_inactivity_seen <= 1);
    assert_eq!(client.calls(), 2);
    assert_eq!(out.csv_rows(), 6);
    assert_eq!(out.json_records().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_waits_until_reset_without_touching_counters() {
    let out = Outputs::new();
    let reset = OffsetDateTime::now_utc() + time::Duration::seconds(30);
    let client = StubClient::new(vec![
        Step::RateLimited(Some(reset)),
        Step::Page(page(0, 2, None)),
    ]);

    let started = Instant::now();
    let report = Harvester::new(&client, settings(10), out.sink(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(29), "{:?}", started.elapsed());
    assert_eq!(report.stop, StopReason::Exhausted);
    assert_eq!(report.records, 2);
    assert_eq!(report.stats.rate_limit_waits, 1);
    assert_eq!(report.stats.timeouts, 0);
    assert_eq!(report.stats.max_inactivity_seen, 0);
    assert_eq!(client.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_without_reset_uses_fallback_wait() {
    let out = Outputs::new();
    let client = StubClient::new(vec![Step::RateLimited(None), Step::Page(page(0, 1, None))]);
    let settings = HarvestSettings {
        rate_limit_fallback: Duration::from_secs(60),
        ..settings(10)
    };

    let started = Instant::now();
    let report = Harvester::new(&client, settings, out.sink(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(report.records, 1);
}

#[tokio::test(start_paused = true)]
async fn persistent_timeouts_fail_and_keep_earlier_records() {
    let out = Outputs::new();
    let client = StubClient::new(vec![Step::Page(page(0, 3, Some("c1")))]).with_fallback(|| Step::Timeout);
    let settings = HarvestSettings {
        max_timeouts: 3,
        timeout_backoff: Duration::from_secs(5),
        ..settings(100)
    };

    let started = Instant::now();
    let err = Harvester::new(&client, settings, out.sink(), CancellationToken::new())
        .run()
        .await
        .unwrap_err();

    match err {
        HarvestError::TimeoutsExhausted { attempts, .. } => assert_eq!(attempts, 4),
        other => panic!("expected timeout exhaustion, got {other:?}"),
    }
    // one page, then max_timeouts retries plus the call that gives up
    assert_eq!(client.calls(), 1 + 4);
    assert!(started.elapsed() >= Duration::from_secs(15));
    assert_eq!(out.csv_rows(), 3);
    assert_eq!(out.json_records().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn a_page_resets_the_timeout_streak() {
    let out = Outputs::new();
    let client = StubClient::new(vec![
        Step::Timeout,
        Step::Timeout,
        Step::Page(page(0, 1, Some("c1"))),
        Step::Timeout,
        Step::Timeout,
        Step::Page(page(1, 1, None)),
    ]);
    let settings = HarvestSettings {
        max_timeouts: 2,
        timeout_backoff: Duration::from_secs(1),
        ..settings(100)
    };

    let report = Harvester::new(&client, settings, out.sink(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert_eq!(report.stop, StopReason::Exhausted);
    assert_eq!(report.records, 2);
    assert_eq!(report.stats.timeouts, 4);
}

#[tokio::test(start_paused = true)]
async fn empty_pages_exhaust_the_query() {
    let out = Outputs::new();
    let client = StubClient::new(vec![
        Step::Page(page(0, 2, Some("c1"))),
        Step::Page(empty(Some("c2"))),
        Step::Page(page(2, 2, Some("c3"))),
    ]);
    let settings = HarvestSettings {
        max_inactivity: 1,
        ..settings(100)
    };

    let report = Harvester::new(&client, settings, out.sink(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    // page, empty, page (streak reset), empty, empty -> over budget
    assert_eq!(client.calls(), 5);
    assert_eq!(report.stop, StopReason::Exhausted);
    assert_eq!(report.records, 4);
    assert_eq!(report.stats.empty_pages, 3);
    assert_eq!(report.stats.max_inactivity_seen, 2);
}

#[tokio::test(start_paused = true)]
async fn stop_flag_ends_run_with_accumulated_records() {
    let out = Outputs::new();
    let cancel = CancellationToken::new();
    let client = StubClient::new(vec![
        Step::Page(page(0, 2, Some("c1"))),
        Step::CancelThen(cancel.clone(), page(2, 2, Some("c2"))),
        Step::Page(page(4, 2, Some("c3"))),
    ]);

    let report = Harvester::new(&client, settings(100), out.sink(), cancel)
        .run()
        .await
        .unwrap();

    assert_eq!(report.stop, StopReason::Cancelled);
    assert_eq!(client.calls(), 2);
    assert_eq!(report.records, 4);
    let saved = out.json_records();
    assert_eq!(saved.len(), 4);
    assert_eq!(saved[3].text, "post 3");
}

#[tokio::test(start_paused = true)]
async fn stop_flag_interrupts_a_long_wait() {
    let out = Outputs::new();
    let cancel = CancellationToken::new();
    let reset = OffsetDateTime::now_utc() + time::Duration::hours(1);
    let client = StubClient::new(vec![
        Step::Page(page(0, 1, Some("c1"))),
        Step::RateLimited(Some(reset)),
    ]);

    let started = Instant::now();
    let trigger = cancel.clone();
    let (result, ()) = tokio::join!(
        Harvester::new(&client, settings(100), out.sink(), cancel).run(),
        async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            trigger.cancel();
        }
    );

    let report = result.unwrap();
    assert_eq!(report.stop, StopReason::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(out.json_records().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn fatal_client_error_still_flushes_json() {
    let out = Outputs::new();
    let client = StubClient::new(vec![Step::Page(page(0, 2, Some("c1"))), Step::Fatal]);

    let err = Harvester::new(&client, settings(100), out.sink(), CancellationToken::new())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Client(_)), "got {err:?}");
    assert_eq!(out.json_records().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn pacing_delay_separates_fetches() {
    let out = Outputs::new();
    let client = StubClient::new(vec![Step::Page(page(0, 1, Some("c1"))), Step::Page(page(1, 1, None))]);
    let settings = HarvestSettings {
        pacing: Pacing::new(Duration::from_secs(7), Duration::from_secs(7)),
        ..HarvestSettings::new("rust", 100)
    };

    let started = Instant::now();
    Harvester::new(&client, settings, out.sink(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_secs(8), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn csv_rows_match_json_length_across_runs() {
    let out = Outputs::new();

    let first = StubClient::new(vec![Step::Page(page(0, 3, None))]);
    let report = Harvester::new(&first, settings(100), out.sink(), CancellationToken::new())
        .run()
        .await
        .unwrap();
    assert_eq!((report.records, report.carried), (3, 0));
    assert_eq!(out.csv_rows(), out.json_records().len());

    let second = StubClient::new(vec![Step::Page(page(3, 2, None))]);
    let report = Harvester::new(&second, settings(2), out.sink(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    // target counts this run only
    assert_eq!(report.stop, StopReason::TargetReached);
    assert_eq!((report.records, report.carried), (2, 3));
    assert_eq!(out.csv_rows(), 5);
    let all = out.json_records();
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].text, "post 0");
    assert_eq!(all[3].author, "Unknown");
    assert_eq!(all[4].author, "user4");
}

#[tokio::test(start_paused = true)]
async fn rewriting_an_unchanged_snapshot_is_byte_identical() {
    let out = Outputs::new();
    let client = StubClient::new(vec![Step::Page(page(0, 4, None))]);
    Harvester::new(&client, settings(100), out.sink(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    let before = std::fs::read(&out.json).unwrap();
    let records = out.json_records();
    out.sink().write_snapshot(&records).unwrap();
    assert_eq!(std::fs::read(&out.json).unwrap(), before);
}
