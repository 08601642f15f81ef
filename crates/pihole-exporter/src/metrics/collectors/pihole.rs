use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use pihole_common::error::{ExporterError, Result};
use tracing::{debug, warn};

use crate::{
    metrics::registry::{GaugeMetric, MetricsRegistry},
    snapshot::{MetricData, RegistryState},
};

const METRIC_PREFIX: &str = "pihole_";

enum PiholeGauge {
    Scalar(Arc<GaugeMetric>),
    Labeled(Arc<GaugeMetric>),
    /// Name collided with an already registered family; never exposed.
    Shadowed,
}

/// Gauges mirroring [`RegistryState`], created the first time a metric name shows up.
#[derive(Default)]
pub struct PiholeMetrics {
    gauges: HashMap<String, PiholeGauge>,
}

impl PiholeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
    }

    pub fn sync(&mut self, registry: &MetricsRegistry, state: &RegistryState) -> Result<()> {
        for (name, data) in state.iter() {
            let gauge = match self.gauges.entry(name.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(register_gauge(registry, name, data)?),
            };

            match (gauge, data) {
                (PiholeGauge::Scalar(gauge), MetricData::Scalar(value)) => gauge.set(&[], *value),
                (PiholeGauge::Labeled(gauge), MetricData::Labeled(labeled)) => {
                    for (label_value, value) in &labeled.values {
                        gauge.set(&[label_value.as_str()], *value);
                    }
                }
                (PiholeGauge::Shadowed, _) => {}
                _ => warn!(metric = %name, "metric kind differs from its registered gauge"),
            }
        }

        Ok(())
    }
}

pub fn metric_name(name: &str) -> String {
    format!("{METRIC_PREFIX}{}", name.to_lowercase())
}

pub fn help_text(name: &str) -> String {
    name.replace('_', " ")
}

fn register_gauge(
    registry: &MetricsRegistry,
    name: &str,
    data: &MetricData,
) -> Result<PiholeGauge> {
    let full_name = metric_name(name);
    if registry.is_registered(&full_name) {
        warn!(
            metric = %name,
            exposed_as = %full_name,
            "metric name already taken, not exposing it"
        );
        return Ok(PiholeGauge::Shadowed);
    }

    let help = help_text(name);
    let gauge = match data {
        MetricData::Scalar(_) => {
            PiholeGauge::Scalar(registry.register_gauge(&full_name, &help, &[])?)
        }
        MetricData::Labeled(labeled) => {
            if labeled.label.is_empty() {
                return Err(ExporterError::UndeclaredLabel(name.to_string()));
            }
            let labels = [labeled.label.as_str()];
            PiholeGauge::Labeled(registry.register_gauge(&full_name, &help, &labels)?)
        }
    };

    debug!(metric = %full_name, "registered pihole gauge");
    Ok(gauge)
}
