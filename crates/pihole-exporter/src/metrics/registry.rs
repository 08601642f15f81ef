use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use pihole_common::error::{ExporterError, Result};

use crate::metrics::types::{CollectedMetric, MetricDescriptor, MetricSample, MetricType};

type LabelValues = Vec<String>;

trait RegisteredMetric: Send + Sync {
    fn descriptor(&self) -> &MetricDescriptor;
    fn collect(&self) -> Vec<MetricSample>;
}

/// Owns every exposable metric family and renders them in the Prometheus text format.
pub struct MetricsRegistry {
    metrics: RwLock<HashMap<String, Arc<dyn RegisteredMetric>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        variable_labels: &[&str],
    ) -> Result<Arc<CounterMetric>> {
        let metric = Arc::new(CounterMetric {
            descriptor: MetricDescriptor::new(name, help, MetricType::Counter, variable_labels),
            series: SeriesMap::new(),
        });
        self.register(metric.clone())?;
        Ok(metric)
    }

    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        variable_labels: &[&str],
    ) -> Result<Arc<GaugeMetric>> {
        let metric = Arc::new(GaugeMetric {
            descriptor: MetricDescriptor::new(name, help, MetricType::Gauge, variable_labels),
            series: SeriesMap::new(),
        });
        self.register(metric.clone())?;
        Ok(metric)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.metrics
            .read()
            .map(|metrics| metrics.contains_key(name))
            .unwrap_or(false)
    }

    pub fn collect_all(&self) -> Vec<CollectedMetric> {
        let metrics = match self.metrics.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        let mut collected = metrics
            .values()
            .map(|metric| CollectedMetric {
                descriptor: metric.descriptor().clone(),
                samples: metric.collect(),
            })
            .collect::<Vec<_>>();

        collected.sort_by(|left, right| left.descriptor.name.cmp(&right.descriptor.name));
        collected
    }

    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();

        for metric in self.collect_all() {
            let name = &metric.descriptor.name;

            output.push_str("# HELP ");
            output.push_str(name);
            output.push(' ');
            output.push_str(&escape_help(&metric.descriptor.help));
            output.push('\n');

            output.push_str("# TYPE ");
            output.push_str(name);
            output.push(' ');
            output.push_str(metric.descriptor.metric_type.as_prometheus_type());
            output.push('\n');

            for sample in &metric.samples {
                render_sample_line(&mut output, name, &sample.labels, sample.value);
            }
        }

        output
    }

    fn register<M: RegisteredMetric + 'static>(&self, metric: Arc<M>) -> Result<()> {
        let name = metric.descriptor().name.clone();
        let mut metrics = self.metrics.write().map_err(|_| {
            ExporterError::InternalError("failed to acquire metrics registry lock".to_string())
        })?;

        if metrics.contains_key(&name) {
            return Err(ExporterError::InvalidArgument(format!(
                "metric already registered: {name}"
            )));
        }

        metrics.insert(name, metric);
        Ok(())
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct SeriesMap {
    series: RwLock<HashMap<LabelValues, Arc<AtomicU64>>>,
}

impl SeriesMap {
    fn new() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_create(&self, label_values: LabelValues) -> Arc<AtomicU64> {
        if let Ok(guard) = self.series.read()
            && let Some(existing) = guard.get(&label_values)
        {
            return existing.clone();
        }

        match self.series.write() {
            Ok(mut guard) => guard
                .entry(label_values)
                .or_insert_with(|| Arc::new(AtomicU64::new(0)))
                .clone(),
            Err(_) => Arc::new(AtomicU64::new(0)),
        }
    }

    /// Samples ordered by label values so renders are stable between scrapes.
    fn collect(&self, descriptor: &MetricDescriptor, decode: fn(u64) -> f64) -> Vec<MetricSample> {
        let series = match self.series.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        let mut entries = series.iter().collect::<Vec<_>>();
        entries.sort_by(|left, right| left.0.cmp(right.0));

        entries
            .into_iter()
            .map(|(label_values, value)| MetricSample {
                labels: materialize_labels(descriptor, label_values),
                value: decode(value.load(Ordering::Relaxed)),
            })
            .collect()
    }
}

pub struct CounterMetric {
    descriptor: MetricDescriptor,
    series: SeriesMap,
}

impl CounterMetric {
    pub fn inc(&self, labels: &[&str], value: u64) {
        let series = self
            .series
            .get_or_create(normalize_labels(&self.descriptor, labels));
        series.fetch_add(value, Ordering::Relaxed);
    }

    pub fn inc_one(&self, labels: &[&str]) {
        self.inc(labels, 1);
    }
}

impl RegisteredMetric for CounterMetric {
    fn descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    fn collect(&self) -> Vec<MetricSample> {
        self.series.collect(&self.descriptor, |raw| raw as f64)
    }
}

/// Gauge holding `f64` values, stored as raw bits.
pub struct GaugeMetric {
    descriptor: MetricDescriptor,
    series: SeriesMap,
}

impl GaugeMetric {
    pub fn set(&self, labels: &[&str], value: f64) {
        let series = self
            .series
            .get_or_create(normalize_labels(&self.descriptor, labels));
        series.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl RegisteredMetric for GaugeMetric {
    fn descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    fn collect(&self) -> Vec<MetricSample> {
        self.series.collect(&self.descriptor, f64::from_bits)
    }
}

fn normalize_labels(descriptor: &MetricDescriptor, labels: &[&str]) -> LabelValues {
    let expected = descriptor.variable_labels.len();
    (0..expected)
        .map(|index| labels.get(index).copied().unwrap_or_default().to_string())
        .collect()
}

fn materialize_labels(descriptor: &MetricDescriptor, values: &[String]) -> Vec<(String, String)> {
    descriptor
        .variable_labels
        .iter()
        .zip(values.iter())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn render_sample_line(output: &mut String, name: &str, labels: &[(String, String)], value: f64) {
    output.push_str(name);

    if !labels.is_empty() {
        output.push('{');
        for (index, (key, value)) in labels.iter().enumerate() {
            if index > 0 {
                output.push(',');
            }
            output.push_str(key);
            output.push_str("=\"");
            output.push_str(&escape_label_value(value));
            output.push('"');
        }
        output.push('}');
    }

    output.push(' ');
    output.push_str(&format_metric_value(value));
    output.push('\n');
}

fn format_metric_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let rendered = if value.is_sign_positive() { "+Inf" } else { "-Inf" };
        rendered.to_string()
    } else if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}
