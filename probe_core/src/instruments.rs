//! The probe's instruments and their exposed names.
//!
//! Names are part of the contract with dashboards and alert rules built
//! on top of the scrape output. Changing one is a breaking change.

use probe_metrics::{CounterHandle, GaugeHandle, MetricRegistry, Result, SummaryHandle};

/// Method label value for every probe.
pub const METHOD: &str = "GET";

pub const DNS_DURATION: &str = "dns_duration_seconds";
pub const TCP_DURATION: &str = "tcp_duration_seconds";
pub const TLS_DURATION: &str = "TLS_duration_seconds";
pub const REQUEST_TIMER: &str = "request_timer";
pub const REQUEST_DURATION: &str = "request_duration_seconds";
pub const PROBE_SUCCESS: &str = "probe_success";
pub const PROBE_ERRORS: &str = "probe_errors_total";

const METHOD_URL: &[&str] = &["method", "url"];

/// Gauges written by a [`PhaseTracer`](crate::PhaseTracer).
#[derive(Clone)]
pub struct PhaseInstruments {
    pub dns: GaugeHandle,
    pub tcp: GaugeHandle,
    pub tls: GaugeHandle,
}

/// Every instrument the probe writes to.
#[derive(Clone)]
pub struct ProbeInstruments {
    pub phases: PhaseInstruments,
    pub request_timer: GaugeHandle,
    pub request_duration: SummaryHandle,
    pub success: GaugeHandle,
    pub errors: CounterHandle,
}

impl ProbeInstruments {
    /// Registers all probe instruments. Fails if any name is already taken.
    pub fn register(registry: &MetricRegistry) -> Result<Self> {
        let phases = PhaseInstruments {
            dns: registry.register_gauge(DNS_DURATION, "Trace dns latency.", METHOD_URL)?,
            tcp: registry.register_gauge(TCP_DURATION, "Trace tcp latency.", METHOD_URL)?,
            tls: registry.register_gauge(TLS_DURATION, "Trace TLS latency.", METHOD_URL)?,
        };

        Ok(Self {
            phases,
            request_timer: registry.register_gauge(REQUEST_TIMER, "Request Timer.", METHOD_URL)?,
            request_duration: registry.register_summary(
                REQUEST_DURATION,
                "Request duration in seconds.",
                &["method"],
            )?,
            success: registry.register_gauge(
                PROBE_SUCCESS,
                "Whether the last probe completed without a transport error.",
                METHOD_URL,
            )?,
            errors: registry.register_counter(
                PROBE_ERRORS,
                "Probes that failed with a transport error.",
                METHOD_URL,
            )?,
        })
    }
}
