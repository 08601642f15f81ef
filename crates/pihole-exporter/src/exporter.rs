use std::sync::Arc;

use futures::future::try_join_all;
use pihole_common::error::{ExporterError, Result};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    fetch::{Endpoint, StatsSource},
    metrics::{MetricsRegistry, PiholeMetrics},
    normalize::normalize,
    snapshot::{RegistryState, Snapshot},
};

struct ScrapeState {
    registry_state: RegistryState,
    pihole_metrics: PiholeMetrics,
}

impl ScrapeState {
    /// Merges a snapshot and mirrors the result into the registry.
    ///
    /// A snapshot that cannot be exposed is rejected before it touches the
    /// retained state.
    fn apply(&mut self, registry: &MetricsRegistry, snapshot: Snapshot) -> Result<()> {
        if let Some(name) = snapshot.unlabeled_metric() {
            return Err(ExporterError::UndeclaredLabel(name.to_string()));
        }

        self.registry_state.merge(snapshot);
        self.pihole_metrics.sync(registry, &self.registry_state)
    }
}

/// Runs one fetch, merge and render cycle per scrape.
///
/// The whole cycle holds a single lock, so concurrent scrapes are served one
/// after another and never observe a half-merged state.
pub struct Exporter {
    source: Arc<dyn StatsSource>,
    registry: Arc<MetricsRegistry>,
    state: Mutex<ScrapeState>,
}

impl Exporter {
    pub fn new(source: Arc<dyn StatsSource>, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            source,
            registry,
            state: Mutex::new(ScrapeState {
                registry_state: RegistryState::new(),
                pihole_metrics: PiholeMetrics::new(),
            }),
        }
    }

    pub fn registry(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.registry)
    }

    /// Fetches every endpoint and normalizes the responses.
    ///
    /// Fails on the first unusable response, before anything is merged.
    pub async fn collect_snapshot(&self) -> Result<Snapshot> {
        let documents = try_join_all(Endpoint::ALL.into_iter().map(|endpoint| async move {
            let document = self.source.fetch(endpoint).await?;
            Ok::<_, ExporterError>((endpoint, document))
        }))
        .await?;

        normalize(documents.iter().map(|(endpoint, document)| (*endpoint, document)))
    }

    pub async fn scrape(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        let snapshot = self.collect_snapshot().await?;
        debug!(metrics = snapshot.len(), "collected pihole snapshot");

        state.apply(&self.registry, snapshot)?;

        Ok(self.registry.render_prometheus())
    }
}
