//! Kernel configuration and the page-derived connection defaults.
//!
//! # Invariants
//! - `merge_config` is a shallow merge: an override block replaces the
//!   whole default block, it is never merged field by field.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Location of the page hosting the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLocation {
    /// `http` or `https`, without the trailing colon.
    pub protocol: String,
    pub hostname: String,
    pub port: Option<u16>,
    pub path: String,
}

impl PageLocation {
    pub fn new(protocol: impl Into<String>, hostname: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            protocol: protocol.into(),
            hostname: hostname.into(),
            port,
            path: String::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// `http://localhost:8000/`
    pub fn localhost() -> Self {
        Self::new("http", "localhost", Some(8000)).with_path("/")
    }

    pub fn is_secure(&self) -> bool {
        self.protocol.trim_end_matches(':').eq_ignore_ascii_case("https")
    }
}

/// Server connection descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub protocol: String,
    pub hostname: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_connection_path")]
    pub path: String,
}

impl ConnectionConfig {
    /// Derives the default descriptor from the hosting page.
    pub fn from_location(location: &PageLocation) -> Self {
        let protocol = if location.is_secure() { "wss" } else { "ws" };
        let path = if location.path.is_empty() {
            default_connection_path()
        } else {
            location.path.clone()
        };
        Self {
            protocol: protocol.to_string(),
            hostname: location.hostname.clone(),
            port: location.port,
            path,
        }
    }

    /// `{protocol}://{hostname}[:{port}]{path}`
    pub fn uri(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}{}", self.protocol, self.hostname, port, self.path),
            None => format!("{}://{}{}", self.protocol, self.hostname, self.path),
        }
    }
}

fn default_connection_path() -> String {
    "/".to_string()
}

/// Deadlines for every suspension point, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub provider_init_ms: u64,
    pub manifest_fetch_ms: u64,
    pub resource_load_ms: u64,
}

impl TimeoutConfig {
    pub fn provider_init(&self) -> Duration {
        Duration::from_millis(self.provider_init_ms)
    }

    pub fn manifest_fetch(&self) -> Duration {
        Duration::from_millis(self.manifest_fetch_ms)
    }

    pub fn resource_load(&self) -> Duration {
        Duration::from_millis(self.resource_load_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            provider_init_ms: 30_000,
            manifest_fetch_ms: 10_000,
            resource_load_ms: 15_000,
        }
    }
}

/// Effective kernel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub ws: ConnectionConfig,
    pub timeouts: TimeoutConfig,
    /// Manifest location relative to the resource root.
    pub manifest: String,
    /// Prefix under which package files are resolved.
    pub resource_root: String,
}

impl CoreConfig {
    pub fn defaults_for(location: &PageLocation) -> Self {
        Self {
            ws: ConnectionConfig::from_location(location),
            timeouts: TimeoutConfig::default(),
            manifest: "metadata.json".to_string(),
            resource_root: "packages".to_string(),
        }
    }
}

/// Caller-supplied configuration blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub ws: Option<ConnectionConfig>,
    pub timeouts: Option<TimeoutConfig>,
    pub manifest: Option<String>,
    pub resource_root: Option<String>,
}

impl ConfigOverrides {
    /// Parses overrides from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Shallow-merges `overrides` over the page-derived defaults.
pub fn merge_config(location: &PageLocation, overrides: ConfigOverrides) -> CoreConfig {
    let defaults = CoreConfig::defaults_for(location);
    CoreConfig {
        ws: overrides.ws.unwrap_or(defaults.ws),
        timeouts: overrides.timeouts.unwrap_or(defaults.timeouts),
        manifest: overrides.manifest.unwrap_or(defaults.manifest),
        resource_root: overrides.resource_root.unwrap_or(defaults.resource_root),
    }
}

#[cfg(test)]
mod tests {
    use super::{merge_config, ConfigOverrides, ConnectionConfig, PageLocation};

    #[test]
    fn secure_page_upgrades_to_wss() {
        let location = PageLocation::new("https", "desk.example", Some(443)).with_path("/app");
        let config = ConnectionConfig::from_location(&location);
        assert_eq!(config.protocol, "wss");
        assert_eq!(config.uri(), "wss://desk.example:443/app");
    }

    #[test]
    fn empty_page_path_defaults_to_root() {
        let location = PageLocation::new("http", "localhost", None);
        let config = ConnectionConfig::from_location(&location);
        assert_eq!(config.path, "/");
        assert_eq!(config.uri(), "ws://localhost/");
    }

    #[test]
    fn partial_ws_override_replaces_whole_block() {
        let location = PageLocation::localhost();
        let overrides = ConfigOverrides::from_json(
            r#"{ "ws": { "protocol": "ws", "hostname": "remote" } }"#,
        )
        .expect("valid overrides");
        let config = merge_config(&location, overrides);

        assert_eq!(config.ws.hostname, "remote");
        // port is not inherited from the page default
        assert_eq!(config.ws.port, None);
        assert_eq!(config.ws.path, "/");
        assert_eq!(config.manifest, "metadata.json");
    }

    #[test]
    fn partial_timeouts_fill_missing_fields_from_defaults() {
        let overrides = ConfigOverrides::from_json(r#"{ "timeouts": { "provider_init_ms": 5 } }"#)
            .expect("valid overrides");
        let config = merge_config(&PageLocation::localhost(), overrides);
        assert_eq!(config.timeouts.provider_init_ms, 5);
        assert_eq!(config.timeouts.resource_load_ms, 15_000);
    }
}
