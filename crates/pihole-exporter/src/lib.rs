//! Pi-hole statistics exposed as Prometheus metrics.
//!
//! Every scrape of `/metrics` fetches the Pi-hole API, folds the answers into
//! a [`snapshot::RegistryState`] that never forgets a series, and renders the
//! result.

pub mod exporter;
pub mod fetch;
pub mod handlers;
pub mod metrics;
pub mod normalize;
pub mod router;
pub mod snapshot;

pub use exporter::Exporter;
pub use fetch::{DEFAULT_TIMEOUT, Endpoint, PiholeClient, StatsSource};
pub use router::{AppState, exporter_router};
