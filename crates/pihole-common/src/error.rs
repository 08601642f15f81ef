use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("failed to fetch {endpoint}: {message}")]
    Fetch { endpoint: String, message: String },
    #[error("upstream endpoint {endpoint} returned status {status}")]
    UpstreamStatus { endpoint: String, status: u16 },
    #[error("failed to parse {endpoint} response: {message}")]
    Parse { endpoint: String, message: String },
    #[error("no label dimension declared for metric: {0}")]
    UndeclaredLabel(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ExporterError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "UpstreamUnavailable",
            Self::UpstreamStatus { .. } => "UpstreamStatus",
            Self::Parse { .. } => "UpstreamMalformed",
            Self::UndeclaredLabel(_) => "UndeclaredLabel",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::InternalError(_) => "InternalError",
        }
    }

    /// True when the failure originated at the Pi-hole API rather than in the exporter.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::UpstreamStatus { .. } | Self::Parse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;

#[cfg(test)]
mod tests {
    use super::ExporterError;

    #[test]
    fn upstream_errors_are_classified() {
        let fetch = ExporterError::Fetch {
            endpoint: "summaryRaw".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(fetch.is_upstream());
        assert_eq!(fetch.error_code(), "UpstreamUnavailable");
        assert_eq!(
            fetch.to_string(),
            "failed to fetch summaryRaw: connection refused"
        );

        let label = ExporterError::UndeclaredLabel("top_clients".to_string());
        assert!(!label.is_upstream());
        assert_eq!(label.error_code(), "UndeclaredLabel");

        let internal = ExporterError::InternalError("metrics registry poisoned".to_string());
        assert!(!internal.is_upstream());
        assert_eq!(internal.error_code(), "InternalError");
    }
}
