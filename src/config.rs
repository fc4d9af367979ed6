//! Client configuration.
//!
//! Loaded from environment variables, with CLI flags layered on top by the
//! binary:
//! - `NOTEDECK_SERVER_URL` - Backend base URL (default: `http://localhost:8000`)
//! - `NOTEDECK_DATA_DIR` - Directory for the client database (default: platform data dir)

use std::path::PathBuf;

/// Default backend URL for local development.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing slash.
    pub server_url: String,
    /// Where the client database lives. `None` uses the platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: normalize_url(server_url.into()),
            data_dir: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let server_url =
            std::env::var("NOTEDECK_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        let data_dir = std::env::var("NOTEDECK_DATA_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            server_url: normalize_url(server_url),
            data_dir,
        }
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = normalize_url(server_url.into());
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn normalize_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
