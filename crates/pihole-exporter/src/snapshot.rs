//! Snapshot model and the continuity-preserving merge into long-lived state.
//!
//! A [`Snapshot`] is what one poll cycle produced. [`RegistryState`] is what
//! scrapers see: every metric name and label value it has ever recorded stays
//! present, falling back to zero whenever the upstream omits it.

use std::collections::BTreeMap;

use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledValues {
    pub label: String,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricData {
    Scalar(f64),
    Labeled(LabeledValues),
}

impl MetricData {
    pub fn labeled<I, K>(label: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self::Labeled(LabeledValues {
            label: label.to_string(),
            values: values
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        })
    }

    pub fn is_labeled(&self) -> bool {
        matches!(self, Self::Labeled(_))
    }

    fn zero(&mut self) {
        match self {
            Self::Scalar(value) => *value = 0.0,
            Self::Labeled(labeled) => labeled.values.values_mut().for_each(|value| *value = 0.0),
        }
    }
}

/// One cycle's normalized data. Consumed by [`RegistryState::merge`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    metrics: BTreeMap<String, MetricData>,
}

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<&MetricData> {
        self.metrics.get(name)
    }

    /// First labeled metric that carries no label dimension.
    pub fn unlabeled_metric(&self) -> Option<&str> {
        self.metrics
            .iter()
            .find(|(_, data)| {
                matches!(data, MetricData::Labeled(labeled) if labeled.label.is_empty())
            })
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl FromIterator<(String, MetricData)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (String, MetricData)>>(iter: T) -> Self {
        Self {
            metrics: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RegistryState {
    metrics: BTreeMap<String, MetricData>,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a fresh snapshot into the retained state.
    ///
    /// Known names and label values are overwritten when the snapshot carries
    /// them and zeroed otherwise; unseen ones are added. Nothing is removed and
    /// a metric's scalar/labeled kind never changes once recorded.
    pub fn merge(&mut self, fresh: Snapshot) {
        if self.metrics.is_empty() {
            self.metrics = fresh.metrics;
            return;
        }

        let mut fresh = fresh.metrics;
        for (name, current) in self.metrics.iter_mut() {
            match (current, fresh.remove(name)) {
                (MetricData::Scalar(value), Some(MetricData::Scalar(incoming))) => {
                    *value = incoming;
                }
                (MetricData::Labeled(current), Some(MetricData::Labeled(incoming))) => {
                    for (label_value, value) in current.values.iter_mut() {
                        *value = incoming.values.get(label_value).copied().unwrap_or(0.0);
                    }
                    for (label_value, value) in incoming.values {
                        current.values.entry(label_value).or_insert(value);
                    }
                }
                (current, Some(_)) => {
                    warn!(
                        metric = %name,
                        labeled = current.is_labeled(),
                        "upstream changed the kind of a known metric, reporting zero"
                    );
                    current.zero();
                }
                (current, None) => current.zero(),
            }
        }

        self.metrics.extend(fresh);
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        match self.metrics.get(name)? {
            MetricData::Scalar(value) => Some(*value),
            MetricData::Labeled(_) => None,
        }
    }

    pub fn labeled_value(&self, name: &str, label_value: &str) -> Option<f64> {
        match self.metrics.get(name)? {
            MetricData::Labeled(labeled) => labeled.values.get(label_value).copied(),
            MetricData::Scalar(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetricData)> {
        self.metrics.iter()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricData, RegistryState, Snapshot};

    fn snapshot(entries: Vec<(&str, MetricData)>) -> Snapshot {
        entries
            .into_iter()
            .map(|(name, data)| (name.to_string(), data))
            .collect()
    }

    #[test]
    fn first_merge_seeds_state() {
        let mut state = RegistryState::new();
        state.merge(snapshot(vec![
            ("dns_queries_today", MetricData::Scalar(42.0)),
            ("top_ads", MetricData::labeled("domain", [("ads.example", 3.0)])),
        ]));

        assert_eq!(state.len(), 2);
        assert_eq!(state.scalar("dns_queries_today"), Some(42.0));
        assert_eq!(state.labeled_value("top_ads", "ads.example"), Some(3.0));
    }

    #[test]
    fn omitted_scalar_is_zero_filled() {
        let mut state = RegistryState::new();
        state.merge(snapshot(vec![("ads_blocked_today", MetricData::Scalar(5.0))]));
        state.merge(snapshot(vec![("unique_clients", MetricData::Scalar(2.0))]));

        assert_eq!(state.scalar("ads_blocked_today"), Some(0.0));
        assert_eq!(state.scalar("unique_clients"), Some(2.0));
    }

    #[test]
    fn label_values_only_grow() {
        let mut state = RegistryState::new();
        state.merge(snapshot(vec![(
            "top_sources",
            MetricData::labeled("client", [("laptop|10.0.0.2", 10.0), ("phone|10.0.0.3", 4.0)]),
        )]));
        state.merge(snapshot(vec![(
            "top_sources",
            MetricData::labeled("client", [("tv|10.0.0.4", 7.0), ("laptop|10.0.0.2", 12.0)]),
        )]));

        assert_eq!(state.labeled_value("top_sources", "laptop|10.0.0.2"), Some(12.0));
        assert_eq!(state.labeled_value("top_sources", "phone|10.0.0.3"), Some(0.0));
        assert_eq!(state.labeled_value("top_sources", "tv|10.0.0.4"), Some(7.0));

        state.merge(Snapshot::default());
        state.merge(snapshot(vec![("status", MetricData::Scalar(1.0))]));

        for label_value in ["laptop|10.0.0.2", "phone|10.0.0.3", "tv|10.0.0.4"] {
            assert_eq!(state.labeled_value("top_sources", label_value), Some(0.0));
        }
    }

    #[test]
    fn identical_snapshot_merges_idempotently() {
        let fresh = snapshot(vec![
            ("ads_percentage_today", MetricData::Scalar(12.5)),
            (
                "query_type",
                MetricData::labeled("type", [("A (IPv4)", 60.0), ("AAAA (IPv6)", 40.0)]),
            ),
        ]);

        let mut state = RegistryState::new();
        state.merge(snapshot(vec![("clients_ever_seen", MetricData::Scalar(3.0))]));
        state.merge(fresh.clone());
        let after_first = state.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>();
        state.merge(fresh);
        let after_second = state.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>();

        assert_eq!(after_first, after_second);
    }

    #[test]
    fn kind_change_keeps_recorded_kind() {
        let mut state = RegistryState::new();
        state.merge(snapshot(vec![("privacy_level", MetricData::Scalar(1.0))]));
        state.merge(snapshot(vec![(
            "privacy_level",
            MetricData::labeled("domain", [("x", 1.0)]),
        )]));

        assert_eq!(state.scalar("privacy_level"), Some(0.0));
    }

    #[test]
    fn finds_labeled_metric_without_dimension() {
        let declared = snapshot(vec![
            ("status", MetricData::Scalar(1.0)),
            ("top_ads", MetricData::labeled("domain", [("ads.example", 3.0)])),
        ]);
        assert_eq!(declared.unlabeled_metric(), None);

        let undeclared = snapshot(vec![
            ("top_ads", MetricData::labeled("domain", [("ads.example", 3.0)])),
            ("top_clients", MetricData::labeled("", [("x", 1.0)])),
        ]);
        assert_eq!(undeclared.unlabeled_metric(), Some("top_clients"));
    }
}
