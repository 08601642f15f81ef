mod credentials;

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use pihole_exporter::{AppState, DEFAULT_TIMEOUT, PiholeClient, exporter_router};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::credentials::{DEFAULT_SETUP_VARS, read_auth_token};

#[derive(Parser, Debug)]
#[command(name = "pihole_exporter", version, about = "Export pihole metrics for prometheus")]
struct Cli {
    /// Pi-hole address
    #[arg(short = 'o', long, default_value = "pi.hole")]
    pihole: String,

    /// Port the exporter listens on
    #[arg(short, long, default_value_t = 9311)]
    port: u16,

    /// Interface the exporter listens on
    #[arg(short, long, default_value = "0.0.0.0")]
    interface: String,

    /// Pi-hole password hash
    #[arg(short, long)]
    auth: Option<String>,

    /// Pi-hole setup file the password hash is read from when --auth is absent
    #[arg(long, default_value = DEFAULT_SETUP_VARS)]
    setup_vars: PathBuf,

    /// Timeout in seconds for each Pi-hole API request
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

impl Cli {
    fn listen_addr(&self) -> String {
        if self.interface.contains(':') && !self.interface.starts_with('[') {
            format!("[{}]:{}", self.interface, self.port)
        } else {
            format!("{}:{}", self.interface, self.port)
        }
    }
}

/// Binds the metrics listener. Failure here ends the process before serving.
async fn bind(addr: &str) -> std::io::Result<TcpListener> {
    TcpListener::bind(addr).await.inspect_err(|err| {
        error!("failed to bind {addr}: {err}");
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env().add_directive("pihole_exporter=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let auth = cli.auth.clone().or_else(|| read_auth_token(&cli.setup_vars));
    if auth.is_none() {
        warn!("no pihole api token configured, only public statistics are available");
    }

    let client = PiholeClient::new(&cli.pihole, auth, Duration::from_secs(cli.timeout_secs))?;
    info!(upstream = %client.api_url(), "using pihole api");

    let state = Arc::new(AppState::new(Arc::new(client))?);
    let app = exporter_router(state);

    let addr = cli.listen_addr();
    let listener = bind(&addr).await?;
    info!("pihole exporter listening on {addr}");

    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    tokio::select! {
        result = server => result??,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    Ok(())
}
