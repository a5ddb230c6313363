//! Request tracing and probe execution.
//!
//! A [`Prober`] issues one GET per call over a [`Transport`] that reports
//! DNS, TCP connect and TLS handshake events to a per-request
//! [`PhaseTracer`]. Phase and total durations land in the shared
//! [`probe_metrics::MetricRegistry`] through [`ProbeInstruments`].

pub mod error;
pub mod executor;
pub mod instruments;
pub mod target;
pub mod trace;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{ProbeError, Result};
pub use executor::{ProbeResult, Prober};
pub use instruments::{PhaseInstruments, ProbeInstruments, METHOD};
pub use target::{Scheme, Target};
pub use trace::{Phase, PhaseBreakdown, PhaseTiming, PhaseTracer, TraceHooks};
pub use transport::Transport;
