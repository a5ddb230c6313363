use chrono::{DateTime, Utc};
use probe_core::{ProbeResult, Prober};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed, no sweep started yet.
    Idle,
    /// Inside the sweep/sleep loop.
    Running,
    /// Shutdown was requested and the loop has exited.
    Stopped,
}

/// Drives a [`Prober`] over the configured URLs, one sweep per interval.
pub struct Scheduler {
    prober: Prober,
    urls: Vec<String>,
    interval: Duration,
    state: SchedulerState,
    sweeps_completed: u64,
}

impl Scheduler {
    pub fn new(prober: Prober, urls: Vec<String>, interval: Duration) -> Self {
        Self {
            prober,
            urls,
            interval,
            state: SchedulerState::Idle,
            sweeps_completed: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn sweeps_completed(&self) -> u64 {
        self.sweeps_completed
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Probes every URL once, sequentially and in configuration order.
    pub async fn sweep(&mut self) -> SweepReport {
        self.sweep_until(&CancellationToken::new()).await
    }

    /// Runs sweeps separated by the interval until `shutdown` is cancelled.
    ///
    /// Cancellation is honoured between probes and during the sleep, so a
    /// probe that has started always finishes or times out.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        self.state = SchedulerState::Running;
        info!(
            "Scheduler started: {} URLs every {:?}",
            self.urls.len(),
            self.interval
        );

        loop {
            self.sweep_until(&shutdown).await;
            if shutdown.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.state = SchedulerState::Stopped;
        info!("Scheduler stopped after {} sweeps", self.sweeps_completed);
    }

    /// Moves the scheduler onto its own task. The handle yields it back
    /// once stopped.
    pub fn spawn(mut self, shutdown: CancellationToken) -> JoinHandle<Self> {
        tokio::spawn(async move {
            self.run(shutdown).await;
            self
        })
    }

    async fn sweep_until(&mut self, shutdown: &CancellationToken) -> SweepReport {
        let sweep = self.sweeps_completed + 1;
        let span = info_span!("sweep", sweep);
        let started_at = Utc::now();
        let start = Instant::now();

        let results = async {
            let mut results = Vec::with_capacity(self.urls.len());
            for url in &self.urls {
                if shutdown.is_cancelled() {
                    info!("Shutdown requested, abandoning remainder of sweep");
                    break;
                }
                results.push(self.prober.probe(url).await);
            }
            results
        }
        .instrument(span.clone())
        .await;

        let report = SweepReport {
            sweep,
            started_at,
            duration: start.elapsed(),
            results,
        };
        self.sweeps_completed = sweep;

        span.in_scope(|| {
            info!(
                ok = report.succeeded(),
                failed = report.failed(),
                duration_ms = report.duration.as_millis() as u64,
                "Sweep finished"
            );
        });

        report
    }
}

/// Results of one sweep, in configuration order.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub sweep: u64,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub results: Vec<ProbeResult>,
}

impl SweepReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn result_for(&self, url: &str) -> Option<&ProbeResult> {
        self.results.iter().find(|r| r.url == url)
    }
}
