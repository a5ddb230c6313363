//! Thread-safe instrument registry for the latency probe.
//!
//! Instruments are registered once at startup and updated concurrently
//! through cloneable handles. [`MetricRegistry::snapshot`] produces a view
//! that [`exporters::PrometheusExporter`] renders for scraping.

pub mod error;
pub mod exporters;
pub mod registry;
pub mod snapshot;
pub mod summary;

pub use error::{MetricsError, Result};
pub use exporters::PrometheusExporter;
pub use registry::{CounterHandle, GaugeHandle, MetricRegistry, SummaryHandle};
pub use snapshot::Snapshot;
pub use summary::{SummaryOpts, SummaryVec};
