pub mod health;
pub mod metrics;

use axum::{Json, http::StatusCode, response::IntoResponse};
use pihole_common::error::ExporterError;

pub struct ExporterApiError(pub ExporterError);

impl From<ExporterError> for ExporterApiError {
    fn from(value: ExporterError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ExporterApiError {
    fn into_response(self) -> axum::response::Response {
        let status = if self.0.is_upstream() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (
            status,
            Json(serde_json::json!({
                "code": self.0.error_code(),
                "message": self.0.to_string(),
            })),
        )
            .into_response()
    }
}
