pub mod collectors;
pub mod registry;
pub mod types;

pub use collectors::{pihole::PiholeMetrics, scrape::ScrapeMetrics};
pub use registry::{CounterMetric, GaugeMetric, MetricsRegistry};
pub use types::{MetricDescriptor, MetricSample, MetricType};
