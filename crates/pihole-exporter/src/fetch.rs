use std::{fmt, time::Duration};

use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use pihole_common::error::{ExporterError, Result};
use serde_json::Value;
use tracing::debug;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const API_PATH: &str = "/admin/api.php";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Summary,
    TopItems,
    TopSources,
    ForwardDestinations,
    QueryTypes,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Self::Summary,
        Self::TopItems,
        Self::TopSources,
        Self::ForwardDestinations,
        Self::QueryTypes,
    ];

    /// Query selector understood by `api.php`.
    pub fn query(&self) -> &'static str {
        match self {
            Self::Summary => "summaryRaw",
            Self::TopItems => "topItems",
            Self::TopSources => "getQuerySources",
            Self::ForwardDestinations => "getForwardDestinations",
            Self::QueryTypes => "getQueryTypes",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query())
    }
}

#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch(&self, endpoint: Endpoint) -> Result<Value>;
}

pub struct PiholeClient {
    api_url: Url,
    auth: Option<String>,
    client: reqwest::Client,
}

impl PiholeClient {
    /// `host` is `host[:port]`, optionally with an `http://` or `https://` scheme.
    pub fn new(host: &str, auth: Option<String>, timeout: Duration) -> Result<Self> {
        let api_url = api_url(host)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                ExporterError::InternalError(format!("failed to build http client: {err}"))
            })?;

        Ok(Self {
            api_url,
            auth: auth.filter(|token| !token.is_empty()),
            client,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> Url {
        let mut url = self.api_url.clone();
        let query = match &self.auth {
            Some(token) => format!(
                "{}&auth={}",
                endpoint.query(),
                utf8_percent_encode(token, NON_ALPHANUMERIC)
            ),
            None => endpoint.query().to_string(),
        };
        url.set_query(Some(&query));
        url
    }

    pub async fn get_json(&self, endpoint: Endpoint) -> Result<Value> {
        debug!(%endpoint, "querying pihole api");

        let response = self
            .client
            .get(self.endpoint_url(endpoint))
            .send()
            .await
            .map_err(|err| ExporterError::Fetch {
                endpoint: endpoint.to_string(),
                message: err.without_url().to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ExporterError::UpstreamStatus {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|err| ExporterError::Fetch {
            endpoint: endpoint.to_string(),
            message: err.without_url().to_string(),
        })?;

        serde_json::from_slice(&body).map_err(|err| ExporterError::Parse {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl StatsSource for PiholeClient {
    async fn fetch(&self, endpoint: Endpoint) -> Result<Value> {
        self.get_json(endpoint).await
    }
}

fn api_url(host: &str) -> Result<Url> {
    let host = host.trim().trim_end_matches('/');
    let base = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };

    let url = Url::parse(&format!("{base}{API_PATH}"))
        .map_err(|err| {
            ExporterError::InvalidArgument(format!("invalid pihole address {host}: {err}"))
        })?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ExporterError::InvalidArgument(format!(
            "pihole address has no host: {host}"
        )));
    }

    Ok(url)
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{Router, http::StatusCode, routing::get};
    use pihole_common::error::ExporterError;
    use serde_json::json;

    use super::{Endpoint, PiholeClient};

    #[test]
    fn endpoint_urls_carry_selector_and_token() {
        let client =
            PiholeClient::new("pi.hole", Some("s3cr3t&x".to_string()), Duration::from_secs(1))
                .unwrap();

        assert_eq!(
            client.endpoint_url(Endpoint::Summary).as_str(),
            "http://pi.hole/admin/api.php?summaryRaw&auth=s3cr3t%26x"
        );

        let anonymous =
            PiholeClient::new("http://192.168.1.2:8080/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(
            anonymous.endpoint_url(Endpoint::QueryTypes).as_str(),
            "http://192.168.1.2:8080/admin/api.php?getQueryTypes"
        );
    }

    #[test]
    fn empty_token_is_ignored() {
        let client =
            PiholeClient::new("pi.hole", Some(String::new()), Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint_url(Endpoint::TopItems).as_str(),
            "http://pi.hole/admin/api.php?topItems"
        );
    }

    #[test]
    fn rejects_unusable_address() {
        let err = PiholeClient::new("pi hole", None, Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, ExporterError::InvalidArgument(_)));
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn fetches_and_parses_json() {
        let router = Router::new().route(
            "/admin/api.php",
            get(|| async { axum::Json(json!({"domains_being_blocked": 100000})) }),
        );
        let client = PiholeClient::new(&serve(router).await, None, Duration::from_secs(5)).unwrap();

        let document = client.get_json(Endpoint::Summary).await.unwrap();
        assert_eq!(document, json!({"domains_being_blocked": 100000}));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let router = Router::new().route(
            "/admin/api.php",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let client = PiholeClient::new(&serve(router).await, None, Duration::from_secs(5)).unwrap();

        let err = client.get_json(Endpoint::TopItems).await.unwrap_err();
        assert!(matches!(
            err,
            ExporterError::UpstreamStatus { status: 503, ref endpoint } if endpoint == "topItems"
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let router = Router::new().route("/admin/api.php", get(|| async { "<html>nope</html>" }));
        let client = PiholeClient::new(&serve(router).await, None, Duration::from_secs(5)).unwrap();

        let err = client.get_json(Endpoint::QueryTypes).await.unwrap_err();
        assert!(matches!(err, ExporterError::Parse { .. }));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_fetch_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = PiholeClient::new(&addr.to_string(), None, Duration::from_secs(2)).unwrap();
        let err = client.get_json(Endpoint::Summary).await.unwrap_err();
        assert!(matches!(err, ExporterError::Fetch { .. }));
    }
}
