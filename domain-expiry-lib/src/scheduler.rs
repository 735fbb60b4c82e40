//! Periodic expiration sweeps.
//!
//! A [`Scheduler`] is idle until [`Scheduler::start`] moves it onto a tokio
//! task and returns a [`SchedulerHandle`]. The first sweep runs right away;
//! later sweeps follow every `interval`. A sweep always finishes before the
//! next one may begin, so a slow sweep pushes the next tick back instead of
//! overlapping it.

use crate::domains::DomainSet;
use crate::report::ReportSink;
use crate::resolver::ExpirationResolver;
use crate::types::{ExpiryReport, ExpiryStatus, MonitorConfig, SweepSummary, MAX_CONCURRENCY};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Source of "now" for day calculations.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Whole days from `now` until `expires_at`, rounded toward negative
/// infinity: 10.5 days gives 10, 4.9 days in the past gives -5.
pub fn days_remaining(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> i64 {
    (expires_at - now)
        .num_milliseconds()
        .div_euclid(MILLIS_PER_DAY)
}

/// Checks every domain in a [`DomainSet`] on a fixed interval.
pub struct Scheduler {
    domains: DomainSet,
    interval: Duration,
    concurrency: usize,
    warn_days: i64,
    resolver: ExpirationResolver,
    sink: Arc<dyn ReportSink>,
    clock: Clock,
}

impl Scheduler {
    /// Create an idle scheduler. Interval, concurrency and warning threshold
    /// are taken from `config`.
    pub fn new(
        config: &MonitorConfig,
        domains: DomainSet,
        resolver: ExpirationResolver,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            domains,
            interval: config.interval,
            concurrency: config.concurrency.clamp(1, MAX_CONCURRENCY),
            warn_days: config.warn_days,
            resolver,
            sink,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used to compute days remaining.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn domains(&self) -> &DomainSet {
        &self.domains
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Check every domain once and report each outcome to the sink.
    ///
    /// At most `concurrency` lookups run at a time. Every domain is reported
    /// exactly once, failures included; no failure stops the sweep.
    pub async fn sweep(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();

        // Owned futures keep the sweep `Send` inside a spawned task.
        let checks: Vec<_> = self
            .domains
            .iter()
            .cloned()
            .map(|domain| {
                let resolver = self.resolver.clone();
                async move {
                    let outcome = resolver.resolve_expiration(domain.as_str()).await;
                    (domain, outcome)
                }
            })
            .collect();
        let mut results = stream::iter(checks).buffer_unordered(self.concurrency);

        while let Some((domain, outcome)) = results.next().await {
            let checked_at = (self.clock)();
            let outcome = outcome.map(|expires_at| ExpiryStatus {
                expires_at,
                days_remaining: days_remaining(checked_at, expires_at),
            });

            summary.checked += 1;
            match &outcome {
                Ok(status) => {
                    summary.ok += 1;
                    if status.days_remaining <= self.warn_days {
                        summary.expiring += 1;
                    }
                }
                Err(_) => summary.failed += 1,
            }

            self.sink.report(&ExpiryReport {
                domain: domain.to_string(),
                checked_at,
                outcome,
            });
        }

        info!(
            "Checked {} domains: {} ok, {} failed, {} expiring within {} days",
            summary.checked, summary.ok, summary.failed, summary.expiring, self.warn_days
        );

        summary
    }

    /// Sweep immediately, then every `interval`, until `shutdown` resolves.
    ///
    /// Shutdown is observed between sweeps; a sweep in progress completes.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut sweeps: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Stopping expiration checks after {} sweeps", sweeps);
                    break;
                }
                _ = ticker.tick() => {
                    sweeps += 1;
                    debug!("Sweep {} over {} domains", sweeps, self.domains.len());
                    self.sweep().await;
                }
            }
        }
    }

    /// Start sweeping on a background task.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, mut signal) = watch::channel(false);

        info!(
            "Monitoring {} domains every {:?}",
            self.domains.len(),
            self.interval
        );

        let join = tokio::spawn(async move {
            self.run_until(async move {
                // A dropped handle leaves the scheduler running.
                let stopped = signal.wait_for(|stop| *stop).await.is_ok();
                if !stopped {
                    std::future::pending::<()>().await;
                }
            })
            .await;
        });

        SchedulerHandle { shutdown, join }
    }
}

/// A running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Stop at the next wait point and wait for the task to finish.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown.send(true);
        self.join.await
    }

    /// Wait for the task without asking it to stop.
    pub async fn join(self) -> Result<(), JoinError> {
        let SchedulerHandle { shutdown, join } = self;
        let result = join.await;
        drop(shutdown);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateResolver;
    use crate::error::ExpiryError;
    use crate::protocols::{TextRecordParser, WhoisClient};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()
    }

    struct EchoWhois;

    #[async_trait]
    impl WhoisClient for EchoWhois {
        async fn query(&self, domain: &str) -> Result<String, ExpiryError> {
            Ok(format!(
                "Domain Name: {}\nRegistry Expiry Date: 2025-03-11T09:30:00Z\n",
                domain
            ))
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ReportSink for Recorder {
        fn report(&self, report: &ExpiryReport) {
            self.0.lock().unwrap().push(report.domain.clone());
        }
    }

    fn scheduler(config: &MonitorConfig, sink: Arc<Recorder>) -> Scheduler {
        let resolver = ExpirationResolver::new(
            Arc::new(EchoWhois),
            Arc::new(TextRecordParser::new()),
            DateResolver::new(),
        );
        let domains = DomainSet::from_names(["a.com", "b.com"]).unwrap();
        Scheduler::new(config, domains, resolver, sink).with_clock(now)
    }

    #[tokio::test]
    async fn test_sweep_runs_on_spawned_task() {
        let sink = Arc::new(Recorder::default());
        let scheduler = scheduler(&MonitorConfig::new("domains.txt"), sink.clone());

        let summary = tokio::spawn(async move { scheduler.sweep().await })
            .await
            .unwrap();

        assert_eq!(summary.checked, 2);
        assert_eq!(summary.ok, 2);
        let mut seen = sink.0.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["a.com", "b.com"]);
    }

    #[test]
    fn test_concurrency_clamped_when_config_built_directly() {
        let mut config = MonitorConfig::new("domains.txt");
        config.concurrency = 500;
        let sink = Arc::new(Recorder::default());
        assert_eq!(scheduler(&config, sink.clone()).concurrency(), MAX_CONCURRENCY);

        config.concurrency = 0;
        assert_eq!(scheduler(&config, sink).concurrency(), 1);
    }

    #[test]
    fn test_days_remaining_floors_partial_days() {
        let expires = now() + ChronoDuration::days(10) + ChronoDuration::hours(12);
        assert_eq!(days_remaining(now(), expires), 10);
    }

    #[test]
    fn test_days_remaining_exact_days() {
        assert_eq!(days_remaining(now(), now() + ChronoDuration::days(30)), 30);
        assert_eq!(days_remaining(now(), now()), 0);
    }

    #[test]
    fn test_days_remaining_for_expired_domains() {
        assert_eq!(days_remaining(now(), now() - ChronoDuration::days(5)), -5);
        // 4 days 23 hours ago still floors to -5.
        let almost_five = now() - ChronoDuration::days(5) + ChronoDuration::hours(1);
        assert_eq!(days_remaining(now(), almost_five), -5);
        let over_five = now() - ChronoDuration::days(5) - ChronoDuration::hours(1);
        assert_eq!(days_remaining(now(), over_five), -6);
        // One millisecond past expiry is already day -1.
        assert_eq!(
            days_remaining(now(), now() - ChronoDuration::milliseconds(1)),
            -1
        );
    }
}
