use crate::error::{MetricsError, Result};
use crate::snapshot::Snapshot;
use prometheus::{Encoder, TextEncoder};
use tracing::error;

pub struct PrometheusExporter;

impl PrometheusExporter {
    /// Content type of the text exposition format.
    pub const CONTENT_TYPE: &'static str = prometheus::TEXT_FORMAT;

    pub fn format(snapshot: &Snapshot) -> Result<String> {
        let families = snapshot.families();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(families, &mut buffer)
            .map_err(|e| {
                error!(
                    error = %e,
                    metric_family_count = families.len(),
                    "Prometheus text encoder failed"
                );
                MetricsError::Encoding(e.to_string())
            })?;

        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }
}
