use crate::error::{MetricsError, Result};
use crate::snapshot::Snapshot;
use crate::summary::{SummaryOpts, SummaryVec};
use prometheus::core::Collector;
use prometheus::{CounterVec, GaugeVec, Opts, Registry};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Process-wide set of named instruments.
///
/// Registration is expected during startup only. Updates go through the
/// returned handles, which are cheap to clone and safe to use from any
/// number of tasks. Clones of the registry share the same instruments.
#[derive(Clone)]
pub struct MetricRegistry {
    registry: Registry,
    names: Arc<Mutex<HashSet<String>>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            names: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn register_gauge(&self, name: &str, help: &str, label_keys: &[&str]) -> Result<GaugeHandle> {
        let vec = GaugeVec::new(Opts::new(name, help), label_keys)
            .map_err(|e| invalid_definition(name, e))?;
        self.register_collector(name, Box::new(vec.clone()))?;
        debug!(metric = name, kind = "gauge", "Registered metric");

        Ok(GaugeHandle {
            name: name.to_string(),
            vec,
        })
    }

    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_keys: &[&str],
    ) -> Result<CounterHandle> {
        let vec = CounterVec::new(Opts::new(name, help), label_keys)
            .map_err(|e| invalid_definition(name, e))?;
        self.register_collector(name, Box::new(vec.clone()))?;
        debug!(metric = name, kind = "counter", "Registered metric");

        Ok(CounterHandle {
            name: name.to_string(),
            vec,
        })
    }

    pub fn register_summary(
        &self,
        name: &str,
        help: &str,
        label_keys: &[&str],
    ) -> Result<SummaryHandle> {
        self.register_summary_with(SummaryOpts::new(name, help), label_keys)
    }

    pub fn register_summary_with(
        &self,
        opts: SummaryOpts,
        label_keys: &[&str],
    ) -> Result<SummaryHandle> {
        let name = opts.name.clone();
        let vec = SummaryVec::new(opts, label_keys)?;
        self.register_collector(&name, Box::new(vec.clone()))?;
        debug!(metric = %name, kind = "summary", "Registered metric");

        Ok(SummaryHandle { vec })
    }

    /// Registers CPU, memory and file-descriptor metrics for this process.
    #[cfg(target_os = "linux")]
    pub fn register_process_collector(&self) -> Result<()> {
        let collector = prometheus::process_collector::ProcessCollector::for_self();
        self.register_collector("process_collector", Box::new(collector))
    }

    #[cfg(not(target_os = "linux"))]
    pub fn register_process_collector(&self) -> Result<()> {
        debug!("Process metrics are only collected on Linux");
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    /// Current state of every instrument.
    ///
    /// Each label set is read under its instrument's own synchronization, so
    /// no entry is ever partially written. Different instruments may be read
    /// at slightly different moments.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.registry.gather())
    }

    fn register_collector(&self, name: &str, collector: Box<dyn Collector>) -> Result<()> {
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        if names.contains(name) {
            return Err(MetricsError::Duplicate {
                name: name.to_string(),
            });
        }

        self.registry.register(collector).map_err(|e| match e {
            prometheus::Error::AlreadyReg => MetricsError::Duplicate {
                name: name.to_string(),
            },
            other => MetricsError::Prometheus(other),
        })?;
        names.insert(name.to_string());

        Ok(())
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_definition(name: &str, err: prometheus::Error) -> MetricsError {
    MetricsError::InvalidDefinition {
        name: name.to_string(),
        reason: err.to_string(),
    }
}

fn label_error(name: &str, err: prometheus::Error) -> MetricsError {
    match err {
        prometheus::Error::InconsistentCardinality { expect, got } => MetricsError::LabelMismatch {
            name: name.to_string(),
            expected: expect,
            got,
        },
        other => MetricsError::Prometheus(other),
    }
}

/// Last-value instrument. `set` overwrites.
#[derive(Clone)]
pub struct GaugeHandle {
    name: String,
    vec: GaugeVec,
}

impl GaugeHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&self, label_values: &[&str], value: f64) -> Result<()> {
        self.vec
            .get_metric_with_label_values(label_values)
            .map_err(|e| label_error(&self.name, e))?
            .set(value);
        Ok(())
    }
}

/// Monotonic instrument.
#[derive(Clone)]
pub struct CounterHandle {
    name: String,
    vec: CounterVec,
}

impl CounterHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inc(&self, label_values: &[&str]) -> Result<()> {
        self.inc_by(label_values, 1.0)
    }

    pub fn inc_by(&self, label_values: &[&str], value: f64) -> Result<()> {
        self.vec
            .get_metric_with_label_values(label_values)
            .map_err(|e| label_error(&self.name, e))?
            .inc_by(value);
        Ok(())
    }
}

/// Distribution instrument. `observe` appends a sample.
#[derive(Clone)]
pub struct SummaryHandle {
    vec: SummaryVec,
}

impl SummaryHandle {
    pub fn name(&self) -> &str {
        self.vec.name()
    }

    pub fn observe(&self, label_values: &[&str], value: f64) -> Result<()> {
        self.vec.observe(label_values, value)
    }
}
