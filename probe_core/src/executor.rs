use crate::{
    error::{ProbeError, Result},
    instruments::{ProbeInstruments, METHOD},
    target::Target,
    trace::{PhaseBreakdown, PhaseTracer},
    transport::Transport,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Outcome of one probe attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub url: String,
    pub total_duration: Duration,
    pub succeeded: bool,
    pub error_detail: Option<String>,
    /// Response status, when the exchange completed.
    pub status: Option<u16>,
    pub phases: PhaseBreakdown,
}

impl ProbeResult {
    pub fn total_duration_seconds(&self) -> f64 {
        self.total_duration.as_secs_f64()
    }
}

/// Issues instrumented GET requests and records their outcome.
#[derive(Clone)]
pub struct Prober {
    transport: Transport,
    instruments: ProbeInstruments,
    timeout: Duration,
}

impl Prober {
    pub fn new(instruments: ProbeInstruments, timeout: Duration) -> Result<Self> {
        Ok(Self::with_transport(Transport::new()?, instruments, timeout))
    }

    pub fn with_transport(transport: Transport, instruments: ProbeInstruments, timeout: Duration) -> Self {
        Self {
            transport,
            instruments,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probes `url` once. Transport failures are reported in the result,
    /// never returned as errors.
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let started = Instant::now();
        let mut tracer = PhaseTracer::new(url, self.instruments.phases.clone());

        let outcome = match Target::parse(url) {
            Ok(target) => {
                match tokio::time::timeout(self.timeout, self.transport.get(&target, &mut tracer)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ProbeError::Timeout(self.timeout)),
                }
            }
            Err(e) => Err(e),
        };

        let total_duration = started.elapsed();
        let phases = tracer.finish();

        let result = match outcome {
            Ok(status) => {
                info!(
                    url,
                    status,
                    duration_ms = total_duration.as_millis() as u64,
                    "Probe completed"
                );
                ProbeResult {
                    url: url.to_string(),
                    total_duration,
                    succeeded: true,
                    error_detail: None,
                    status: Some(status),
                    phases,
                }
            }
            Err(e) => {
                warn!(
                    url,
                    kind = e.kind(),
                    duration_ms = total_duration.as_millis() as u64,
                    "Probe failed: {}",
                    e
                );
                ProbeResult {
                    url: url.to_string(),
                    total_duration,
                    succeeded: false,
                    error_detail: Some(e.to_string()),
                    status: None,
                    phases,
                }
            }
        };

        if let Err(e) = self.record(&result) {
            warn!(url, "Failed to record probe result: {}", e);
        }

        result
    }

    fn record(&self, result: &ProbeResult) -> Result<()> {
        let labels = [METHOD, result.url.as_str()];
        let seconds = result.total_duration_seconds();

        self.instruments.request_timer.set(&labels, seconds)?;
        self.instruments
            .success
            .set(&labels, if result.succeeded { 1.0 } else { 0.0 })?;

        if result.succeeded {
            self.instruments.request_duration.observe(&[METHOD], seconds)?;
        } else {
            self.instruments.errors.inc(&labels)?;
        }

        Ok(())
    }
}
