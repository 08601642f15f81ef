use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use pihole_common::error::Result;
use tower_http::trace::TraceLayer;

use crate::{
    exporter::Exporter,
    fetch::StatsSource,
    handlers,
    metrics::{MetricsRegistry, ScrapeMetrics},
};

pub struct AppState {
    pub exporter: Arc<Exporter>,
    pub scrape_metrics: Arc<ScrapeMetrics>,
}

impl AppState {
    pub fn new(source: Arc<dyn StatsSource>) -> Result<Self> {
        let registry = Arc::new(MetricsRegistry::new());
        let scrape_metrics = Arc::new(ScrapeMetrics::register(registry.as_ref())?);
        let exporter = Arc::new(Exporter::new(source, registry));

        Ok(Self {
            exporter,
            scrape_metrics,
        })
    }
}

pub fn exporter_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics::prometheus_metrics))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            handlers::metrics::track_scrape_metrics,
        ))
        .route("/health/live", get(handlers::health::health_live))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
