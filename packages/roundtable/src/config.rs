//! Client configuration.
//!
//! Merged from three layers, later layers winning: built-in defaults, a
//! `roundtable.toml` in the working directory, and `ROUNDTABLE_*` environment
//! variables (e.g. `ROUNDTABLE_TOKEN`).

use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Path the backend serves the multi-agent socket on.
const WS_PATH: &str = "/api/multi-agent/ws";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundtableConfig {
    /// Base HTTP URL of the backend.
    pub server_url: String,

    /// Bearer token. Required before the session channel will initialize.
    #[serde(default)]
    pub token: String,

    /// User identity attached to dispatches.
    #[serde(default)]
    pub user_id: String,
}

impl Default for RoundtableConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            token: String::new(),
            user_id: String::new(),
        }
    }
}

impl RoundtableConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("roundtable.toml"))
    }

    fn load_from(path: &Path) -> Result<Self> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ROUNDTABLE_"))
            .extract()
            .context("Failed to load configuration")
    }

    /// Absolute URL for an HTTP API path.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }

    /// WebSocket URL for the session channel, derived from `server_url`.
    pub fn ws_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{base}")
        };
        format!("{base}{WS_PATH}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = RoundtableConfig::default();
        assert_eq!(config.server_url, "http://127.0.0.1:8080");
        assert!(config.token.is_empty());
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RoundtableConfig::load_from(&dir.path().join("roundtable.toml")).unwrap();
        assert_eq!(config.server_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn load_from_toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtable.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "server_url = \"https://chat.example.com\"").unwrap();
        writeln!(file, "token = \"tok-1\"").unwrap();

        let config = RoundtableConfig::load_from(&path).unwrap();
        assert_eq!(config.server_url, "https://chat.example.com");
        assert_eq!(config.token, "tok-1");
        assert_eq!(config.user_id, "");
    }

    #[test]
    fn env_overrides_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("roundtable.toml", "token = \"from-toml\"")?;
            jail.set_env("ROUNDTABLE_TOKEN", "from-env");
            let config = RoundtableConfig::load_from(Path::new("roundtable.toml")).unwrap();
            assert_eq!(config.token, "from-env");
            Ok(())
        });
    }

    #[test]
    fn api_url_joins_without_double_slash() {
        let config = RoundtableConfig {
            server_url: "http://localhost:8080/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.api_url("/api/multi-chat"),
            "http://localhost:8080/api/multi-chat"
        );
    }

    #[test]
    fn ws_url_swaps_scheme() {
        let http = RoundtableConfig {
            server_url: "http://localhost:8080".to_string(),
            ..Default::default()
        };
        assert_eq!(http.ws_url(), "ws://localhost:8080/api/multi-agent/ws");

        let https = RoundtableConfig {
            server_url: "https://chat.example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(https.ws_url(), "wss://chat.example.com/api/multi-agent/ws");
    }
}
