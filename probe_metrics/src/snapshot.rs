use crate::error::Result;
use crate::exporters::PrometheusExporter;
use prometheus::proto::{Metric, MetricFamily};

/// Point-in-time copy of the registry, ready for exposition.
#[derive(Debug, Clone)]
pub struct Snapshot {
    families: Vec<MetricFamily>,
}

impl Snapshot {
    pub fn new(families: Vec<MetricFamily>) -> Self {
        Self { families }
    }

    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// True if `name` has at least one series carrying all of `labels`.
    pub fn contains(&self, name: &str, labels: &[(&str, &str)]) -> bool {
        self.find(name, labels).is_some()
    }

    pub fn gauge_value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.find(name, labels).map(|m| m.get_gauge().get_value())
    }

    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.find(name, labels).map(|m| m.get_counter().get_value())
    }

    pub fn summary_count(&self, name: &str, labels: &[(&str, &str)]) -> Option<u64> {
        self.find(name, labels)
            .map(|m| m.get_summary().get_sample_count())
    }

    pub fn summary_sum(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.find(name, labels).map(|m| m.get_summary().get_sample_sum())
    }

    /// Render in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String> {
        PrometheusExporter::format(self)
    }

    fn find(&self, name: &str, labels: &[(&str, &str)]) -> Option<&Metric> {
        self.families
            .iter()
            .find(|family| family.get_name() == name)?
            .get_metric()
            .iter()
            .find(|metric| {
                labels.iter().all(|(key, value)| {
                    metric
                        .get_label()
                        .iter()
                        .any(|pair| pair.get_name() == *key && pair.get_value() == *value)
                })
            })
    }
}
