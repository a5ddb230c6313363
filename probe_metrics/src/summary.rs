//! Decaying summary instrument.
//!
//! The `prometheus` crate ships gauges, counters and histograms but no
//! summary, so this module provides one as a custom [`Collector`]. Each
//! label-value combination keeps a cumulative sample count and sum, plus a
//! bounded window of recent samples from which quantiles are computed at
//! collection time. Samples older than `max_age` fall out of the window.

use crate::error::{MetricsError, Result};
use prometheus::core::{Collector, Desc};
use prometheus::proto::{LabelPair, Metric, MetricFamily, MetricType, Quantile, Summary};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_OBJECTIVES: [f64; 3] = [0.5, 0.9, 0.99];
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(600);
pub const DEFAULT_MAX_SAMPLES: usize = 500;

#[derive(Debug, Clone)]
pub struct SummaryOpts {
    pub name: String,
    pub help: String,
    pub objectives: Vec<f64>,
    pub max_age: Duration,
    pub max_samples: usize,
}

impl SummaryOpts {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            objectives: DEFAULT_OBJECTIVES.to_vec(),
            max_age: DEFAULT_MAX_AGE,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }

    pub fn objectives(mut self, objectives: Vec<f64>) -> Self {
        self.objectives = objectives;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| MetricsError::InvalidDefinition {
            name: self.name.clone(),
            reason,
        };

        if let Some(q) = self.objectives.iter().find(|q| !(**q > 0.0 && **q <= 1.0)) {
            return Err(invalid(format!("quantile {} is outside (0, 1]", q)));
        }
        if self.max_age.is_zero() {
            return Err(invalid("max_age must be > 0".to_string()));
        }
        if self.max_samples == 0 {
            return Err(invalid("max_samples must be > 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct Series {
    count: u64,
    sum: f64,
    window: VecDeque<(Instant, f64)>,
}

impl Series {
    fn observe(&mut self, value: f64, now: Instant, opts: &SummaryOpts) {
        self.count += 1;
        self.sum += value;
        self.window.push_back((now, value));
        while self.window.len() > opts.max_samples {
            self.window.pop_front();
        }
        self.expire(now, opts.max_age);
    }

    fn expire(&mut self, now: Instant, max_age: Duration) {
        while let Some(&(observed_at, _)) = self.window.front() {
            if now.saturating_duration_since(observed_at) > max_age {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn quantiles(&self, objectives: &[f64]) -> Vec<(f64, f64)> {
        let mut sorted: Vec<f64> = self.window.iter().map(|(_, v)| *v).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        objectives
            .iter()
            .map(|&q| (q, quantile(&sorted, q)))
            .collect()
    }
}

/// Nearest-rank quantile over an already sorted slice. NaN when empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }

    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

struct SummaryInner {
    desc: Desc,
    opts: SummaryOpts,
    label_keys: Vec<String>,
    series: Mutex<HashMap<Vec<String>, Series>>,
}

/// A summary partitioned by label values. Clones share state.
#[derive(Clone)]
pub struct SummaryVec {
    inner: Arc<SummaryInner>,
}

impl SummaryVec {
    pub fn new(opts: SummaryOpts, label_keys: &[&str]) -> Result<Self> {
        opts.validate()?;

        let label_keys: Vec<String> = label_keys.iter().map(|k| k.to_string()).collect();
        let desc = Desc::new(
            opts.name.clone(),
            opts.help.clone(),
            label_keys.clone(),
            HashMap::new(),
        )
        .map_err(|e| MetricsError::InvalidDefinition {
            name: opts.name.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            inner: Arc::new(SummaryInner {
                desc,
                opts,
                label_keys,
                series: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.opts.name
    }

    pub fn observe(&self, label_values: &[&str], value: f64) -> Result<()> {
        self.observe_at(label_values, value, Instant::now())
    }

    pub(crate) fn observe_at(&self, label_values: &[&str], value: f64, now: Instant) -> Result<()> {
        if label_values.len() != self.inner.label_keys.len() {
            return Err(MetricsError::LabelMismatch {
                name: self.inner.opts.name.clone(),
                expected: self.inner.label_keys.len(),
                got: label_values.len(),
            });
        }

        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        let mut series = self
            .inner
            .series
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        series
            .entry(key)
            .or_default()
            .observe(value, now, &self.inner.opts);

        Ok(())
    }

    pub(crate) fn collect_at(&self, now: Instant) -> MetricFamily {
        let opts = &self.inner.opts;
        let mut family = MetricFamily::default();
        family.set_name(opts.name.clone());
        family.set_help(opts.help.clone());
        family.set_field_type(MetricType::SUMMARY);

        let mut series = self
            .inner
            .series
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        for (values, entry) in series.iter_mut() {
            entry.expire(now, opts.max_age);

            let mut summary = Summary::default();
            summary.set_sample_count(entry.count);
            summary.set_sample_sum(entry.sum);
            for (q, value) in entry.quantiles(&opts.objectives) {
                let mut quantile = Quantile::default();
                quantile.set_quantile(q);
                quantile.set_value(value);
                summary.mut_quantile().push(quantile);
            }

            let mut pairs: Vec<LabelPair> = self
                .inner
                .label_keys
                .iter()
                .zip(values)
                .map(|(key, value)| {
                    let mut pair = LabelPair::default();
                    pair.set_name(key.clone());
                    pair.set_value(value.clone());
                    pair
                })
                .collect();
            pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));

            let mut metric = Metric::default();
            for pair in pairs {
                metric.mut_label().push(pair);
            }
            metric.set_summary(summary);
            family.mut_metric().push(metric);
        }

        family
    }
}

impl Collector for SummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.inner.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        vec![self.collect_at(Instant::now())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> SummaryVec {
        SummaryVec::new(
            SummaryOpts::new("test_duration_seconds", "Test durations.")
                .max_age(Duration::from_secs(60))
                .max_samples(4),
            &["method"],
        )
        .unwrap()
    }

    fn quantile_value(family: &MetricFamily, q: f64) -> f64 {
        family.get_metric()[0]
            .get_summary()
            .get_quantile()
            .iter()
            .find(|quantile| quantile.get_quantile() == q)
            .map(|quantile| quantile.get_value())
            .unwrap()
    }

    #[test]
    fn test_count_and_sum_accumulate() {
        let summary = summary();
        summary.observe(&["GET"], 0.1).unwrap();
        summary.observe(&["GET"], 0.3).unwrap();

        let family = summary.collect_at(Instant::now());
        let metric = &family.get_metric()[0];
        assert_eq!(metric.get_summary().get_sample_count(), 2);
        assert!((metric.get_summary().get_sample_sum() - 0.4).abs() < 1e-9);
        assert_eq!(metric.get_label()[0].get_name(), "method");
        assert_eq!(metric.get_label()[0].get_value(), "GET");
    }

    #[test]
    fn test_quantiles_nearest_rank() {
        let summary = summary();
        for value in [4.0, 1.0, 3.0, 2.0] {
            summary.observe(&["GET"], value).unwrap();
        }

        let family = summary.collect_at(Instant::now());
        assert_eq!(quantile_value(&family, 0.5), 2.0);
        assert_eq!(quantile_value(&family, 0.99), 4.0);
    }

    #[test]
    fn test_window_is_bounded_but_count_is_not() {
        let summary = summary();
        for value in [100.0, 1.0, 1.0, 1.0, 1.0] {
            summary.observe(&["GET"], value).unwrap();
        }

        let family = summary.collect_at(Instant::now());
        assert_eq!(family.get_metric()[0].get_summary().get_sample_count(), 5);
        assert_eq!(quantile_value(&family, 0.99), 1.0);
    }

    #[test]
    fn test_old_samples_decay() {
        let summary = summary();
        let start = Instant::now();
        summary.observe_at(&["GET"], 5.0, start).unwrap();

        let later = start + Duration::from_secs(120);
        let family = summary.collect_at(later);
        let metric = &family.get_metric()[0];

        assert_eq!(metric.get_summary().get_sample_count(), 1);
        assert!(quantile_value(&family, 0.5).is_nan());
    }

    #[test]
    fn test_label_mismatch() {
        let summary = summary();
        let err = summary.observe(&["GET", "extra"], 1.0).unwrap_err();
        assert!(matches!(
            err,
            MetricsError::LabelMismatch {
                expected: 1,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_objective_rejected() {
        let result = SummaryVec::new(
            SummaryOpts::new("bad_summary", "Bad.").objectives(vec![1.5]),
            &[],
        );
        assert!(matches!(result, Err(MetricsError::InvalidDefinition { .. })));
    }

    proptest::proptest! {
        #[test]
        fn prop_quantiles_are_observed_and_ordered(
            mut values in proptest::collection::vec(0.0f64..10.0, 1..50)
        ) {
            values.sort_by(|a, b| a.total_cmp(b));
            let median = quantile(&values, 0.5);
            let p99 = quantile(&values, 0.99);

            proptest::prop_assert!(values.contains(&median));
            proptest::prop_assert!(median <= p99);
            proptest::prop_assert_eq!(quantile(&values, 1.0), values[values.len() - 1]);
        }
    }
}
