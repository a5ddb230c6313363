use crate::ui;
use anyhow::{bail, Result};
use probe_core::{Phase, ProbeInstruments, ProbeResult, Prober};
use probe_metrics::MetricRegistry;
use serde_json::json;
use std::time::Duration;

pub async fn execute(urls: Vec<String>, timeout: Duration, as_json: bool) -> Result<()> {
    let registry = MetricRegistry::new();
    let prober = Prober::new(ProbeInstruments::register(&registry)?, timeout)?;

    let mut results = Vec::with_capacity(urls.len());
    for url in &urls {
        results.push(prober.probe(url).await);
    }

    if as_json {
        let rendered: Vec<_> = results.iter().map(to_json).collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        ui::print_header("Probe Results");
        for result in &results {
            ui::print_result(result);
        }
        ui::print_info(&format!(
            "{} of {} probes succeeded",
            results.iter().filter(|r| r.succeeded).count(),
            results.len()
        ));
    }

    let failed = results.iter().filter(|r| !r.succeeded).count();
    if failed > 0 {
        bail!("{} of {} probes failed", failed, results.len());
    }

    Ok(())
}

fn to_json(result: &ProbeResult) -> serde_json::Value {
    let seconds = |phase| result.phases.get(phase).map(|d: Duration| d.as_secs_f64());
    json!({
        "url": result.url,
        "succeeded": result.succeeded,
        "status": result.status,
        "error": result.error_detail,
        "total_seconds": result.total_duration_seconds(),
        "dns_seconds": seconds(Phase::Dns),
        "tcp_seconds": seconds(Phase::Connect),
        "tls_seconds": seconds(Phase::Tls),
    })
}
