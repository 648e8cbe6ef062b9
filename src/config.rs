//! Process configuration.
//!
//! All environment lookups happen here, once, at startup. The resulting
//! [`AppConfig`] is passed by reference into the components that need it so
//! the engines themselves never touch ambient state.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Default timeout for outbound remote API calls, in seconds.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 20;

/// Application configuration, built once from the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server listens on.
    pub listen_addr: SocketAddr,

    /// Path to the SQLite database file.
    pub db_path: PathBuf,

    /// Base URL of the remote code-hosting API.
    pub remote_base_url: String,

    /// Access token for the remote API. `None` means sync requests are
    /// rejected (not a crash).
    pub remote_token: Option<String>,

    /// Owner (namespace) shared by all tracked repositories.
    pub remote_owner: String,

    /// Repository names to sync, under `remote_owner`.
    pub repos: Vec<String>,

    /// Timeout applied to each outbound remote call, in seconds.
    pub remote_timeout_secs: u64,

    /// Allowed CORS origin for the dashboard frontend.
    pub cors_origin: String,

    /// Optional internal tracking endpoint for the best-effort
    /// sync-to-internal notification. `None` disables the notification.
    pub notify_endpoint: Option<String>,
}

impl AppConfig {
    /// Build the configuration from the process environment.
    ///
    /// Every variable has a default except the remote token, whose absence
    /// is carried as `None` and surfaced as a request rejection at sync time.
    pub fn from_env() -> Self {
        let listen_addr = env_or_default("TRACKER_ADDR", "127.0.0.1:8080")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8080)));

        let repos = env_or_default("TRACKER_REPOS", "")
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect();

        Self {
            listen_addr,
            db_path: PathBuf::from(env_or_default("TRACKER_DB_PATH", "./tracker.db")),
            remote_base_url: env_or_default("TRACKER_REMOTE_URL", "https://api.gitcode.com"),
            remote_token: std::env::var("TRACKER_REMOTE_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            remote_owner: env_or_default("TRACKER_REMOTE_OWNER", ""),
            repos,
            remote_timeout_secs: std::env::var("TRACKER_REMOTE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS),
            cors_origin: env_or_default("TRACKER_CORS_ORIGIN", "http://localhost:5173"),
            notify_endpoint: std::env::var("TRACKER_NOTIFY_ENDPOINT")
                .ok()
                .filter(|t| !t.is_empty()),
        }
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}
