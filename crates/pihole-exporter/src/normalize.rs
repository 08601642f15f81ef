use std::collections::BTreeMap;

use pihole_common::error::{ExporterError, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    fetch::Endpoint,
    snapshot::{MetricData, Snapshot},
};

const STATUS_KEY: &str = "status";
const STATUS_ENABLED: &str = "enabled";
const GRAVITY_KEY: &str = "gravity_last_updated";
const GRAVITY_TIMESTAMP_KEY: &str = "absolute";

/// Label dimension for each labeled Pi-hole metric. Anything else has none.
pub fn label_for(metric: &str) -> Option<&'static str> {
    match metric {
        "top_queries" | "top_ads" => Some("domain"),
        "top_sources" => Some("client"),
        "forward_destinations" => Some("resolver"),
        "query_type" => Some("type"),
        _ => None,
    }
}

/// `(document key, metric name)` pairs each non-summary endpoint contributes.
fn labeled_sections(endpoint: Endpoint) -> &'static [(&'static str, &'static str)] {
    match endpoint {
        Endpoint::Summary => &[],
        Endpoint::TopItems => &[("top_queries", "top_queries"), ("top_ads", "top_ads")],
        Endpoint::TopSources => &[("top_sources", "top_sources")],
        Endpoint::ForwardDestinations => &[("forward_destinations", "forward_destinations")],
        Endpoint::QueryTypes => &[("querytypes", "query_type")],
    }
}

/// Builds one snapshot out of the raw documents of a poll cycle.
pub fn normalize<'a, I>(documents: I) -> Result<Snapshot>
where
    I: IntoIterator<Item = (Endpoint, &'a Value)>,
{
    let mut metrics = BTreeMap::new();
    for (endpoint, document) in documents {
        normalize_endpoint(endpoint, document, &mut metrics)?;
    }
    Ok(metrics.into_iter().collect())
}

pub fn normalize_endpoint(
    endpoint: Endpoint,
    document: &Value,
    metrics: &mut BTreeMap<String, MetricData>,
) -> Result<()> {
    if is_falsy(document) {
        debug!(%endpoint, "empty response, skipping");
        return Ok(());
    }

    let object = document.as_object().ok_or_else(|| ExporterError::Parse {
        endpoint: endpoint.to_string(),
        message: format!("expected a JSON object, got {}", json_kind(document)),
    })?;

    if endpoint == Endpoint::Summary {
        normalize_summary(object, metrics);
        return Ok(());
    }

    for (key, metric) in labeled_sections(endpoint) {
        let Some(section) = object.get(*key) else {
            warn!(%endpoint, key, "response is missing an expected section");
            continue;
        };
        let entries = section.as_object().ok_or_else(|| ExporterError::Parse {
            endpoint: endpoint.to_string(),
            message: format!("`{key}` should be an object, got {}", json_kind(section)),
        })?;
        let label =
            label_for(metric).ok_or_else(|| ExporterError::UndeclaredLabel(metric.to_string()))?;

        let values = entries.iter().filter_map(|(label_value, value)| {
            let number = as_number(value);
            if number.is_none() {
                debug!(%endpoint, metric, label_value, "skipping non-numeric entry");
            }
            number.map(|number| (label_value.clone(), number))
        });
        metrics.insert(metric.to_string(), MetricData::labeled(label, values));
    }

    Ok(())
}

fn normalize_summary(summary: &Map<String, Value>, metrics: &mut BTreeMap<String, MetricData>) {
    for (key, value) in summary {
        let number = match key.as_str() {
            STATUS_KEY => Some(if value.as_str() == Some(STATUS_ENABLED) { 1.0 } else { 0.0 }),
            GRAVITY_KEY => value.get(GRAVITY_TIMESTAMP_KEY).and_then(as_number),
            _ => as_number(value),
        };

        match number {
            Some(number) => {
                metrics.insert(key.clone(), MetricData::Scalar(number));
            }
            None => debug!(key, "skipping non-numeric summary field"),
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
