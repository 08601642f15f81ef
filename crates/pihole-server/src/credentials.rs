use std::path::Path;

use tracing::{debug, warn};

pub const DEFAULT_SETUP_VARS: &str = "/etc/pihole/setupVars.conf";

const PASSWORD_KEY: &str = "WEBPASSWORD";

/// Reads the API token from Pi-hole's `setupVars.conf`.
///
/// A missing or unreadable file is not fatal: the exporter then talks to the
/// API without a token and only sees the unauthenticated endpoints.
pub fn read_auth_token(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let token = parse_setup_vars(&contents);
            if token.is_none() {
                debug!(path = %path.display(), "no {PASSWORD_KEY} entry found");
            }
            token
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unable to read pihole credentials");
            None
        }
    }
}

/// Value of the last `WEBPASSWORD=` line, if it is non-empty.
pub fn parse_setup_vars(contents: &str) -> Option<String> {
    contents
        .lines()
        .filter_map(|line| line.strip_prefix(PASSWORD_KEY)?.strip_prefix('='))
        .last()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
