use std::{sync::Arc, time::Duration};

use pihole_common::error::Result;

use crate::metrics::registry::{CounterMetric, GaugeMetric, MetricsRegistry};

/// Self-observability of the exporter: how scrapes of `/metrics` went.
pub struct ScrapeMetrics {
    scrapes_total: Arc<CounterMetric>,
    scrape_errors_total: Arc<CounterMetric>,
    last_scrape_duration_seconds: Arc<GaugeMetric>,
}

impl ScrapeMetrics {
    pub fn register(registry: &MetricsRegistry) -> Result<Self> {
        let scrapes_total = registry.register_counter(
            "pihole_exporter_scrapes_total",
            "Total number of scrapes served by the exporter",
            &["status"],
        )?;

        let scrape_errors_total = registry.register_counter(
            "pihole_exporter_scrape_errors_total",
            "Total number of scrapes that failed",
            &["status"],
        )?;

        let last_scrape_duration_seconds = registry.register_gauge(
            "pihole_exporter_last_scrape_duration_seconds",
            "Duration of the most recent scrape in seconds",
            &["status"],
        )?;

        Ok(Self {
            scrapes_total,
            scrape_errors_total,
            last_scrape_duration_seconds,
        })
    }

    pub fn record_scrape(&self, status: u16, duration: Duration) {
        let status_value = status.to_string();
        self.scrapes_total.inc_one(&[status_value.as_str()]);
        self.last_scrape_duration_seconds
            .set(&[status_value.as_str()], duration.as_secs_f64());

        if status >= 500 {
            self.scrape_errors_total.inc_one(&[status_value.as_str()]);
        }
    }
}
