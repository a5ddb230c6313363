//! Connection lifecycle tracing.
//!
//! A transport reports lifecycle events through [`TraceHooks`]. The
//! [`PhaseTracer`] implementation pairs start/done events into phase
//! durations and writes them to the phase gauges.
//!
//! Events may be missing or repeated. A `done` with no open timer records
//! a zero-length phase, and a repeated `start` restarts the timer so the
//! last start wins. Timers still open when the tracer is finished are
//! discarded without recording anything.

use crate::instruments::{PhaseInstruments, METHOD};
use probe_metrics::GaugeHandle;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Lifecycle callbacks fired by the transport, in program order, for a
/// single request. Implementations are never called concurrently.
#[cfg_attr(test, mockall::automock)]
pub trait TraceHooks: Send {
    fn dns_start(&mut self, host: &str);
    fn dns_done(&mut self);
    fn connect_start(&mut self, addr: SocketAddr);
    fn connect_done(&mut self, addr: SocketAddr);
    fn tls_start(&mut self);
    fn tls_done(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Dns,
    Connect,
    Tls,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Dns => "dns",
            Phase::Connect => "tcp",
            Phase::Tls => "tls",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Timer for one phase of one request.
#[derive(Debug, Clone)]
pub struct PhaseTiming {
    phase: Phase,
    started_at: Option<Instant>,
}

impl PhaseTiming {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            started_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        self.started_at.is_some()
    }

    /// Opens the timer, replacing any earlier start.
    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
    }

    /// Closes the timer. With no open timer, it opens and closes at `now`.
    pub fn finish(&mut self, now: Instant) -> Duration {
        let started_at = self.started_at.take().unwrap_or(now);
        now.saturating_duration_since(started_at)
    }
}

/// Durations committed during one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseBreakdown {
    pub dns: Option<Duration>,
    pub connect: Option<Duration>,
    pub tls: Option<Duration>,
    /// Number of committed phase observations.
    pub observations: usize,
}

impl PhaseBreakdown {
    pub fn get(&self, phase: Phase) -> Option<Duration> {
        match phase {
            Phase::Dns => self.dns,
            Phase::Connect => self.connect,
            Phase::Tls => self.tls,
        }
    }

    fn record(&mut self, phase: Phase, elapsed: Duration) {
        let slot = match phase {
            Phase::Dns => &mut self.dns,
            Phase::Connect => &mut self.connect,
            Phase::Tls => &mut self.tls,
        };
        *slot = Some(elapsed);
        self.observations += 1;
    }
}

/// Per-request [`TraceHooks`] that records phase durations.
pub struct PhaseTracer {
    url: String,
    instruments: PhaseInstruments,
    dns: PhaseTiming,
    connect: PhaseTiming,
    tls: PhaseTiming,
    breakdown: PhaseBreakdown,
}

impl PhaseTracer {
    pub fn new(url: impl Into<String>, instruments: PhaseInstruments) -> Self {
        Self {
            url: url.into(),
            instruments,
            dns: PhaseTiming::new(Phase::Dns),
            connect: PhaseTiming::new(Phase::Connect),
            tls: PhaseTiming::new(Phase::Tls),
            breakdown: PhaseBreakdown::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn breakdown(&self) -> &PhaseBreakdown {
        &self.breakdown
    }

    /// Ends the trace. Timers that never saw their `done` event are dropped.
    pub fn finish(self) -> PhaseBreakdown {
        for timing in [&self.dns, &self.connect, &self.tls] {
            if timing.is_pending() {
                debug!(
                    url = %self.url,
                    phase = %timing.phase(),
                    "Phase did not complete, discarding timer"
                );
            }
        }
        self.breakdown
    }

    fn timing_mut(&mut self, phase: Phase) -> &mut PhaseTiming {
        match phase {
            Phase::Dns => &mut self.dns,
            Phase::Connect => &mut self.connect,
            Phase::Tls => &mut self.tls,
        }
    }

    fn gauge(&self, phase: Phase) -> &GaugeHandle {
        match phase {
            Phase::Dns => &self.instruments.dns,
            Phase::Connect => &self.instruments.tcp,
            Phase::Tls => &self.instruments.tls,
        }
    }

    fn begin(&mut self, phase: Phase) {
        let timing = self.timing_mut(phase);
        if timing.is_pending() {
            debug!(phase = %phase, "Phase restarted before completing");
        }
        timing.start(Instant::now());
    }

    fn commit(&mut self, phase: Phase) {
        let now = Instant::now();
        let timing = self.timing_mut(phase);
        let lazily_opened = !timing.is_pending();
        let elapsed = timing.finish(now);

        if lazily_opened {
            debug!(url = %self.url, phase = %phase, "Done event without start, recording zero");
        }

        if let Err(e) = self
            .gauge(phase)
            .set(&[METHOD, &self.url], elapsed.as_secs_f64())
        {
            warn!(url = %self.url, phase = %phase, "Failed to record phase duration: {}", e);
        }
        self.breakdown.record(phase, elapsed);
    }
}

impl TraceHooks for PhaseTracer {
    fn dns_start(&mut self, _host: &str) {
        self.begin(Phase::Dns);
    }

    fn dns_done(&mut self) {
        self.commit(Phase::Dns);
    }

    fn connect_start(&mut self, _addr: SocketAddr) {
        self.begin(Phase::Connect);
    }

    fn connect_done(&mut self, _addr: SocketAddr) {
        self.commit(Phase::Connect);
    }

    fn tls_start(&mut self) {
        self.begin(Phase::Tls);
    }

    fn tls_done(&mut self) {
        self.commit(Phase::Tls);
    }
}
