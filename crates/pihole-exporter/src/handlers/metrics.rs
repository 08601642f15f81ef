use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{handlers::ExporterApiError, router::AppState};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn prometheus_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Response, ExporterApiError> {
    let payload = state.exporter.scrape().await.inspect_err(|err| {
        warn!(error = %err, "scrape failed");
    })?;

    let mut response = Response::new(Body::from(payload));
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));

    Ok(response)
}

pub async fn track_scrape_metrics(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let started_at = Instant::now();

    let response = next.run(request).await;
    state
        .scrape_metrics
        .record_scrape(response.status().as_u16(), started_at.elapsed());

    response
}
