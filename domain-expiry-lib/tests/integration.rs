// domain-expiry-lib/tests/integration.rs

//! Integration tests for the scheduler, driven by in-memory WHOIS fakes.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use domain_expiry_lib::{
    DateResolver, DomainSet, ExpirationResolver, ExpiryError, ExpiryReport, MonitorConfig,
    ReportSink, Scheduler, TextRecordParser, WhoisClient,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Answers from a fixed table; unknown domains fail the query.
struct FakeWhois {
    answers: HashMap<String, String>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeWhois {
    fn new<D: AsRef<str>, A: AsRef<str>>(answers: &[(D, A)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(d, a)| (d.as_ref().to_string(), a.as_ref().to_string()))
                .collect(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl WhoisClient for FakeWhois {
    async fn query(&self, domain: &str) -> Result<String, ExpiryError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.answers
            .get(domain)
            .cloned()
            .ok_or_else(|| ExpiryError::query(domain, "connection refused"))
    }
}

/// Keeps every report in memory.
#[derive(Default)]
struct CollectingSink {
    reports: Mutex<Vec<ExpiryReport>>,
}

impl ReportSink for CollectingSink {
    fn report(&self, report: &ExpiryReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

/// Forwards the domain and the (tokio) time it was reported.
struct ChannelSink {
    tx: mpsc::UnboundedSender<(String, Instant)>,
}

impl ReportSink for ChannelSink {
    fn report(&self, report: &ExpiryReport) {
        let _ = self.tx.send((report.domain.clone(), Instant::now()));
    }
}

fn record(expiry: &str) -> String {
    format!("Domain Name: EXAMPLE\nRegistry Expiry Date: {}\n", expiry)
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

fn resolver(client: Arc<FakeWhois>) -> ExpirationResolver {
    ExpirationResolver::new(client, Arc::new(TextRecordParser::new()), DateResolver::new())
}

fn three_domains() -> DomainSet {
    DomainSet::from_names(["one.com", "two.com", "three.com"]).unwrap()
}

#[tokio::test]
async fn test_failed_domain_does_not_abort_sweep() {
    let client = Arc::new(FakeWhois::new(&[
        ("one.com", &record("2025-06-11T12:00:00Z")),
        // two.com is missing, so its query fails
        ("three.com", &record("2025-05-27")),
    ]));
    let sink = Arc::new(CollectingSink::default());
    let config = MonitorConfig::new("unused.txt").with_concurrency(1);

    let scheduler = Scheduler::new(&config, three_domains(), resolver(client), sink.clone())
        .with_clock(fixed_now);
    let summary = scheduler.sweep().await;

    assert_eq!(summary.checked, 3);
    assert_eq!(summary.ok, 2);
    assert_eq!(summary.failed, 1);

    let reports = sink.reports.lock().unwrap();
    let domains: Vec<&str> = reports.iter().map(|r| r.domain.as_str()).collect();
    assert_eq!(domains, vec!["one.com", "two.com", "three.com"]);

    // 10 days 12 hours ahead floors to 10.
    assert_eq!(reports[0].outcome.as_ref().unwrap().days_remaining, 10);
    assert!(matches!(reports[1].outcome, Err(ExpiryError::Query { .. })));
    // Expired 5 days ago.
    let expired = reports[2].outcome.as_ref().unwrap();
    assert_eq!(expired.days_remaining, -5);
    assert!(expired.is_expired());
}

#[tokio::test]
async fn test_unrecognized_date_is_reported_with_raw_value() {
    let client = Arc::new(FakeWhois::new(&[("one.com", &record("31/12/2025"))]));
    let sink = Arc::new(CollectingSink::default());
    let config = MonitorConfig::new("unused.txt");
    let domains = DomainSet::from_names(["one.com"]).unwrap();

    Scheduler::new(&config, domains, resolver(client), sink.clone())
        .sweep()
        .await;

    let reports = sink.reports.lock().unwrap();
    assert_eq!(
        reports[0].outcome,
        Err(ExpiryError::UnrecognizedDateFormat {
            domain: "one.com".to_string(),
            raw: "31/12/2025".to_string(),
        })
    );
}

#[tokio::test]
async fn test_expiring_domains_are_counted() {
    let client = Arc::new(FakeWhois::new(&[
        ("one.com", &record("2025-06-11T00:00:00Z")),
        ("two.com", &record("2026-06-01T00:00:00Z")),
        ("three.com", &record("2025-05-01")),
    ]));
    let sink = Arc::new(CollectingSink::default());
    let config = MonitorConfig::new("unused.txt").with_warn_days(30);

    let summary = Scheduler::new(&config, three_domains(), resolver(client), sink)
        .with_clock(fixed_now)
        .sweep()
        .await;

    assert_eq!(summary.ok, 3);
    assert_eq!(summary.expiring, 2);
    assert!(!summary.has_failures());
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_is_bounded() {
    let names: Vec<String> = (0..20).map(|i| format!("domain{}.com", i)).collect();
    let answers: Vec<(String, String)> = names
        .iter()
        .map(|n| (n.clone(), record("2030-01-01")))
        .collect();

    let client = Arc::new(FakeWhois::new(&answers).with_delay(Duration::from_millis(50)));
    let sink = Arc::new(CollectingSink::default());
    let config = MonitorConfig::new("unused.txt").with_concurrency(4);

    let summary = Scheduler::new(
        &config,
        DomainSet::from_names(&names).unwrap(),
        resolver(client.clone()),
        sink.clone(),
    )
    .sweep()
    .await;

    assert_eq!(summary.checked, 20);
    assert_eq!(sink.reports.lock().unwrap().len(), 20);
    let max = client.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 4, "saw {} concurrent queries", max);
    assert!(max > 1, "queries never overlapped");
}

#[tokio::test(start_paused = true)]
async fn test_start_checks_immediately_then_every_interval() {
    let client = Arc::new(FakeWhois::new(&[
        ("one.com", &record("2030-01-01")),
        ("two.com", &record("2030-01-01")),
        ("three.com", &record("2030-01-01")),
    ]));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = MonitorConfig::new("unused.txt").with_interval(Duration::from_secs(3600));
    let started = Instant::now();

    let handle = Scheduler::new(
        &config,
        three_domains(),
        resolver(client),
        Arc::new(ChannelSink { tx }),
    )
    .start();

    for _ in 0..3 {
        let (_, at) = rx.recv().await.unwrap();
        assert_eq!(at.duration_since(started), Duration::ZERO);
    }

    for _ in 0..3 {
        let (_, at) = rx.recv().await.unwrap();
        assert_eq!(at.duration_since(started), Duration::from_secs(3600));
    }

    assert!(handle.is_running());
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_further_sweeps() {
    let client = Arc::new(FakeWhois::new(&[("one.com", &record("2030-01-01"))]));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = MonitorConfig::new("unused.txt").with_interval(Duration::from_secs(60));

    let handle = Scheduler::new(
        &config,
        DomainSet::from_names(["one.com"]).unwrap(),
        resolver(client),
        Arc::new(ChannelSink { tx }),
    )
    .start();

    assert_eq!(rx.recv().await.unwrap().0, "one.com");
    handle.shutdown().await.unwrap();

    // The sink, and with it the sender, is dropped once the task ends.
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_slow_sweep_delays_next_tick_instead_of_overlapping() {
    let client = Arc::new(
        FakeWhois::new(&[
            ("one.com", &record("2030-01-01")),
            ("two.com", &record("2030-01-01")),
        ])
        .with_delay(Duration::from_secs(5)),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = MonitorConfig::new("unused.txt")
        .with_interval(Duration::from_secs(1))
        .with_concurrency(1);
    let started = Instant::now();

    let handle = Scheduler::new(
        &config,
        DomainSet::from_names(["one.com", "two.com"]).unwrap(),
        resolver(client.clone()),
        Arc::new(ChannelSink { tx }),
    )
    .start();

    let mut offsets = Vec::new();
    for _ in 0..4 {
        let (_, at) = rx.recv().await.unwrap();
        offsets.push(at.duration_since(started).as_secs());
    }
    handle.shutdown().await.unwrap();

    // First sweep ends at 10s; the second starts only then.
    assert_eq!(offsets, vec![5, 10, 15, 20]);
    assert_eq!(client.max_in_flight.load(Ordering::SeqCst), 1);
}

#[test]
fn test_empty_domain_file_prevents_scheduling() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"\n\n   \n").unwrap();
    file.flush().unwrap();

    let err = DomainSet::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ExpiryError::Config { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_days_remaining_matches_floor_of_hours() {
    let now = fixed_now();
    let expires = now + ChronoDuration::days(10) + ChronoDuration::hours(12);
    assert_eq!(domain_expiry_lib::days_remaining(now, expires), 10);
    assert_eq!(
        domain_expiry_lib::days_remaining(now, now - ChronoDuration::days(5)),
        -5
    );
}
