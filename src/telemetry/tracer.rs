//! Bandwidth tracer state machine.
//!
//! ```text
//! Idle ──started_connection──► Measuring ──close──► Closed
//! ```
//!
//! While measuring, every sent packet is counted twice: once in the open
//! interval window and once in the lifetime totals. A window is closed on a
//! path change, on the reporting timer and at connection close. Closing
//! swaps in a fresh window under the state lock; persisting and reporting
//! the closed one happen after the lock is released.
//!
//! Every window close holds a read guard on `settling` until its row is
//! written and its report is queued. `close` takes the write guard, so no
//! window can be settled after the sink is released.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{CsvStatsWriter, IntervalStats, LifetimeStats, ReportingConfig};
use crate::oracle::{OracleApi, Report};
use crate::selection::PathSubscriber;
use crate::types::{Endpoint, IsdAs, Path, PathFingerprint};

/// Lifecycle of a tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracerPhase {
    Idle,
    Measuring,
    Closed,
}

/// Whether a caller waits for the oracle report of a closed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Block until the report was submitted.
    Wait,
    /// Submit on a background task.
    Background,
}

/// Point-in-time copy of a tracer's counters.
#[derive(Debug, Clone)]
pub struct TracerSnapshot {
    pub phase: TracerPhase,
    pub interval: IntervalStats,
    pub lifetime: LifetimeStats,
}

#[derive(Debug)]
struct TracerState {
    phase: TracerPhase,
    interval: IntervalStats,
    lifetime: LifetimeStats,
    /// Source and destination of the measured connection.
    endpoints: Option<(IsdAs, IsdAs)>,
    /// Whether a path was ever assigned.
    has_path: bool,
}

impl TracerState {
    fn new(now: DateTime<Local>) -> Self {
        Self {
            phase: TracerPhase::Idle,
            interval: IntervalStats::open(now, None),
            lifetime: LifetimeStats::open(now),
            endpoints: None,
            has_path: false,
        }
    }

    fn record(&mut self, bytes: u64) {
        self.interval.bytes_sent += bytes;
        self.lifetime.bytes_sent += bytes;
    }

    /// Close the open window at `now` and open the next one labelled `next`.
    fn rollover(&mut self, now: DateTime<Local>, next: Option<PathFingerprint>) -> IntervalStats {
        let mut closed = std::mem::replace(&mut self.interval, IntervalStats::open(now, next));
        closed.end = Some(now);
        closed
    }
}

struct Inner {
    config: ReportingConfig,
    oracle: Option<Arc<dyn OracleApi>>,
    state: Mutex<TracerState>,
    sink: Mutex<CsvStatsWriter>,
    settling: RwLock<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Background report submissions not yet awaited.
    reports: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Measures the bandwidth of one connection.
///
/// Cheap to clone; all clones share the same counters.
#[derive(Clone)]
pub struct BandwidthTracer {
    inner: Arc<Inner>,
}

impl BandwidthTracer {
    /// Create an idle tracer. Without an oracle client windows are only
    /// persisted.
    pub fn new(
        config: ReportingConfig,
        sink: CsvStatsWriter,
        oracle: Option<Arc<dyn OracleApi>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                oracle,
                state: Mutex::new(TracerState::new(Local::now())),
                sink: Mutex::new(sink),
                settling: RwLock::new(()),
                tasks: Mutex::new(Vec::new()),
                reports: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn phase(&self) -> TracerPhase {
        self.inner.state.lock().phase
    }

    /// Start measuring. Spawns the reporting timer (if configured) and the
    /// consumer of the selector's path notifications.
    pub fn started_connection(&self, local: &Endpoint, remote: &Endpoint, paths: PathSubscriber) {
        {
            let mut state = self.inner.state.lock();
            if state.phase != TracerPhase::Idle {
                warn!(phase = ?state.phase, "connection already started");
                return;
            }
            let now = Local::now();
            state.interval = IntervalStats::open(now, None);
            state.lifetime = LifetimeStats::open(now);
            state.endpoints = Some((local.ia, remote.ia));
            state.phase = TracerPhase::Measuring;
        }
        info!(%local, %remote, "started measuring connection");

        let mut tasks = Vec::with_capacity(2);
        if self.inner.config.continuous_reporting() {
            tasks.push(self.spawn_reporting_timer());
        }
        tasks.push(self.spawn_path_consumer(paths));
        self.inner.tasks.lock().extend(tasks);
    }

    /// Count a sent packet. Ignored unless measuring.
    pub fn sent_packet(&self, size: usize) {
        let mut state = self.inner.state.lock();
        if state.phase == TracerPhase::Measuring {
            state.record(size as u64);
        }
    }

    /// Adopt a newly selected path as the label of subsequent bytes.
    pub async fn on_path_change(&self, path: Option<Path>) {
        let next = path.map(|p| p.fingerprint);

        let _settling = self.inner.settling.read().await;
        let closed = {
            let mut state = self.inner.state.lock();
            if state.phase != TracerPhase::Measuring {
                return;
            }

            let closed = if state.has_path && self.inner.config.report_on_path_change {
                Some(state.rollover(Local::now(), next.clone()))
            } else {
                state.interval.fingerprint.clone_from(&next);
                None
            };

            if let Some(ref fp) = next {
                state.has_path = true;
                state.lifetime.fingerprints.push(fp.clone());
                state.lifetime.path_changes += 1;
            }
            closed
        };

        debug!(fp = ?next, "path changed");
        if let Some(closed) = closed {
            self.settle(closed, "path changed", Submission::Background).await;
        }
    }

    /// Close the open window, persist it and report it. Returns the closed
    /// window, or `None` when the tracer is not measuring.
    pub async fn finish_interval(&self, trigger: &'static str, submission: Submission) -> Option<IntervalStats> {
        let _settling = self.inner.settling.read().await;
        let closed = {
            let mut state = self.inner.state.lock();
            if state.phase != TracerPhase::Measuring {
                return None;
            }
            let label = state.interval.fingerprint.clone();
            state.rollover(Local::now(), label)
        };

        self.settle(closed.clone(), trigger, submission).await;
        Some(closed)
    }

    /// Stop measuring: write the lifetime row, close and report the last
    /// window, wait for outstanding reports and release the sink. Later
    /// calls do nothing.
    pub async fn close(&self) {
        // Waits out windows already being settled and holds off new ones
        // until the phase reads closed.
        let _settling = self.inner.settling.write().await;
        let (lifetime, closed) = {
            let mut state = self.inner.state.lock();
            let was_measuring = state.phase == TracerPhase::Measuring;
            if state.phase == TracerPhase::Closed {
                return;
            }
            state.phase = TracerPhase::Closed;
            if !was_measuring {
                return;
            }

            let now = Local::now();
            state.lifetime.end = Some(now);
            let label = state.interval.fingerprint.clone();
            (state.lifetime.clone(), state.rollover(now, label))
        };

        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }

        info!(
            bytes_sent = lifetime.bytes_sent,
            path_changes = lifetime.path_changes,
            fingerprints = %lifetime.joined_fingerprints(),
            "connection closed"
        );
        if let Err(e) = self.inner.sink.lock().write_lifetime(&lifetime) {
            warn!(error = %e, "could not write lifetime stats");
        }

        self.settle(closed, "connection closed", Submission::Wait).await;

        let pending: Vec<_> = self.inner.reports.lock().drain(..).collect();
        for report in pending {
            let _ = report.await;
        }

        if let Err(e) = self.inner.sink.lock().close() {
            warn!(error = %e, "could not close stats files");
        }
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> TracerSnapshot {
        let state = self.inner.state.lock();
        TracerSnapshot {
            phase: state.phase,
            interval: state.interval.clone(),
            lifetime: state.lifetime.clone(),
        }
    }

    /// Persist a closed window and hand its report to the oracle.
    async fn settle(&self, closed: IntervalStats, trigger: &'static str, submission: Submission) {
        debug!(
            trigger,
            fp = ?closed.fingerprint,
            bytes_sent = closed.bytes_sent,
            "finished interval"
        );
        if let Err(e) = self.inner.sink.lock().write_interval(&closed) {
            warn!(trigger, error = %e, "could not write interval stats");
        }

        let Some((oracle, report)) = self.report_for(&closed) else {
            return;
        };

        match submission {
            Submission::Wait => submit(oracle, report, trigger).await,
            Submission::Background => {
                let task = tokio::spawn(submit(oracle, report, trigger));
                let mut reports = self.inner.reports.lock();
                reports.retain(|r| !r.is_finished());
                reports.push(task);
            }
        }
    }

    fn report_for(&self, closed: &IntervalStats) -> Option<(Arc<dyn OracleApi>, Report)> {
        let oracle = self.inner.oracle.clone()?;
        let (src, dst) = self.inner.state.lock().endpoints?;

        if closed.duration() < self.inner.config.min_interval_for_report {
            debug!(duration = ?closed.duration(), "interval too short to report");
            return None;
        }

        // No path or no duration, nothing the oracle could use.
        let report = closed.to_report(&self.inner.config, src, dst)?;
        Some((oracle, report))
    }

    fn spawn_reporting_timer(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.reporting_interval;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(tracer) = upgrade(&weak) else { break };
                if tracer
                    .finish_interval("continuously reporting", Submission::Background)
                    .await
                    .is_none()
                {
                    break;
                }
            }
        })
    }

    fn spawn_path_consumer(&self, mut paths: PathSubscriber) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            while paths.changed().await {
                let path = paths.latest();
                let Some(tracer) = upgrade(&weak) else { break };
                tracer.on_path_change(path).await;
            }
            debug!("path notifications ended");
        })
    }
}

impl std::fmt::Debug for BandwidthTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandwidthTracer")
            .field("phase", &self.phase())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

fn upgrade(weak: &Weak<Inner>) -> Option<BandwidthTracer> {
    weak.upgrade().map(|inner| BandwidthTracer { inner })
}

async fn submit(oracle: Arc<dyn OracleApi>, report: Report, trigger: &'static str) {
    let throughput = report.properties.get("throughput").copied().unwrap_or_default();
    match oracle.report_stats(&report).await {
        Ok(()) => info!(
            trigger,
            fp = %report.path_fp,
            throughput,
            duration = report.metadata.duration,
            "reported interval stats"
        ),
        Err(e) => warn!(trigger, fp = %report.path_fp, error = %e, "failed to report interval stats"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{path_channel, test_support::path};
    use proptest::prelude::*;
    use std::time::Duration;

    fn endpoints() -> (Endpoint, Endpoint) {
        (
            Endpoint::new(IsdAs::new(1, 0xff00_0000_0110), "127.0.0.1:4000".parse().unwrap()),
            Endpoint::new(IsdAs::new(1, 0xff00_0000_0111), "127.0.0.1:5000".parse().unwrap()),
        )
    }

    fn quiet_config() -> ReportingConfig {
        ReportingConfig {
            reporting_interval: Duration::ZERO,
            ..ReportingConfig::default()
        }
    }

    #[test]
    fn test_packets_ignored_while_idle() {
        let tracer = BandwidthTracer::new(quiet_config(), CsvStatsWriter::disabled(), None);
        tracer.sent_packet(100);
        let snapshot = tracer.snapshot();
        assert_eq!(snapshot.phase, TracerPhase::Idle);
        assert_eq!(snapshot.lifetime.bytes_sent, 0);
    }

    #[tokio::test]
    async fn test_first_path_labels_open_window() {
        let tracer = BandwidthTracer::new(quiet_config(), CsvStatsWriter::disabled(), None);
        let (_publisher, subscriber) = path_channel();
        let (local, remote) = endpoints();
        tracer.started_connection(&local, &remote, subscriber);

        tracer.sent_packet(10);
        tracer.on_path_change(Some(path("a", 1, 0))).await;

        let snapshot = tracer.snapshot();
        assert_eq!(snapshot.interval.fingerprint, Some("a".into()));
        assert_eq!(snapshot.interval.bytes_sent, 10);
        assert_eq!(snapshot.lifetime.path_changes, 1);
    }

    #[tokio::test]
    async fn test_path_change_rolls_over() {
        let tracer = BandwidthTracer::new(quiet_config(), CsvStatsWriter::disabled(), None);
        let (_publisher, subscriber) = path_channel();
        let (local, remote) = endpoints();
        tracer.started_connection(&local, &remote, subscriber);

        tracer.on_path_change(Some(path("a", 1, 0))).await;
        tracer.sent_packet(1000);
        tracer.on_path_change(Some(path("b", 2, 10))).await;
        tracer.sent_packet(500);

        let snapshot = tracer.snapshot();
        assert_eq!(snapshot.interval.fingerprint, Some("b".into()));
        assert_eq!(snapshot.interval.bytes_sent, 500);
        assert_eq!(snapshot.lifetime.bytes_sent, 1500);
        assert_eq!(snapshot.lifetime.joined_fingerprints(), "a - b");
    }

    #[tokio::test]
    async fn test_no_path_keeps_history() {
        let tracer = BandwidthTracer::new(quiet_config(), CsvStatsWriter::disabled(), None);
        let (_publisher, subscriber) = path_channel();
        let (local, remote) = endpoints();
        tracer.started_connection(&local, &remote, subscriber);

        tracer.on_path_change(Some(path("a", 1, 0))).await;
        tracer.on_path_change(None).await;

        let snapshot = tracer.snapshot();
        assert_eq!(snapshot.interval.fingerprint, None);
        assert_eq!(snapshot.lifetime.fingerprints, vec![PathFingerprint::new("a")]);
    }

    #[tokio::test]
    async fn test_consumer_follows_published_paths() {
        let tracer = BandwidthTracer::new(quiet_config(), CsvStatsWriter::disabled(), None);
        let (publisher, subscriber) = path_channel();
        let (local, remote) = endpoints();
        tracer.started_connection(&local, &remote, subscriber);

        publisher.publish(Some(path("a", 1, 0)));
        for _ in 0..100 {
            if tracer.snapshot().interval.fingerprint.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(tracer.snapshot().interval.fingerprint, Some("a".into()));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let tracer = BandwidthTracer::new(quiet_config(), CsvStatsWriter::disabled(), None);
        let (_publisher, subscriber) = path_channel();
        let (local, remote) = endpoints();
        tracer.started_connection(&local, &remote, subscriber);
        tracer.sent_packet(5);

        tracer.close().await;
        let first = tracer.snapshot();
        tracer.close().await;
        let second = tracer.snapshot();

        assert_eq!(first.phase, TracerPhase::Closed);
        assert_eq!(first.lifetime, second.lifetime);
        assert!(first.lifetime.end.is_some());

        tracer.sent_packet(5);
        assert_eq!(tracer.snapshot().lifetime.bytes_sent, 5);
        assert!(tracer.finish_interval("late", Submission::Wait).await.is_none());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Send(u16),
        Rollover,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => any::<u16>().prop_map(Op::Send),
            1 => Just(Op::Rollover),
        ]
    }

    proptest! {
        #[test]
        fn prop_rollover_preserves_bytes(ops in prop::collection::vec(op(), 0..64)) {
            let mut state = TracerState::new(Local::now());
            let mut finished = 0u64;

            for op in ops {
                match op {
                    Op::Send(n) => state.record(u64::from(n)),
                    Op::Rollover => {
                        let label = state.interval.fingerprint.clone();
                        finished += state.rollover(Local::now(), label).bytes_sent;
                    }
                }
                prop_assert_eq!(finished + state.interval.bytes_sent, state.lifetime.bytes_sent);
            }
        }
    }
}
