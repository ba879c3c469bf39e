// Server configuration
//
// Defaults, overlaid by an optional JSON file, overlaid by environment.

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::session::DEFAULT_DELAY;
use crate::{MockStreamError, Result};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory.
pub const CONFIG_PATH: &str = "mock-event-stream-config.json";
/// Data file used when none is configured.
pub const DATA_PATH: &str = "mock-event-stream-data.json";

const DEFAULT_PORT: u16 = 5000;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Delay between streamed chunks, in milliseconds.
    pub latency_ms: u64,
    pub data_path: PathBuf,
    pub chunk_size: usize,
}

/// On-disk shape. Every field is optional; zero port/latency mean "default".
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    host: Option<String>,
    port: Option<u16>,
    latency: Option<u64>,
    data_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            latency_ms: DEFAULT_DELAY.as_millis() as u64,
            data_path: PathBuf::from(DATA_PATH),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ServerConfig {
    /// Load configuration the way the server binary does: the JSON file named
    /// by `MOCKSTREAM_CONFIG` (or `./mock-event-stream-config.json`), then
    /// environment overrides.
    pub fn load() -> Self {
        let path = std::env::var("MOCKSTREAM_CONFIG").unwrap_or_else(|_| CONFIG_PATH.into());
        Self::load_from(&path).with_env()
    }

    /// Overlay the JSON file at `path` onto defaults.
    ///
    /// A missing or invalid file is logged and leaves the defaults in place.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(raw) => match Self::from_json(&raw) {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(target: "config", path = %path.display(), error = %e, "Configuration is not valid JSON; using defaults");
                    Self::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(target: "config", path = %path.display(), "Configuration not found; using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::error!(target: "config", path = %path.display(), error = %e, "Failed to read configuration; using defaults");
                Self::default()
            }
        }
    }

    /// Parse a JSON config document and overlay it onto defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(raw)
            .map_err(|e| MockStreamError::Config(e.to_string()))?;
        Ok(Self::default().overlay(file))
    }

    fn overlay(mut self, file: ConfigFile) -> Self {
        if let Some(host) = file.host.filter(|h| !h.is_empty()) {
            self.host = host;
        }
        if let Some(port) = file.port.filter(|p| *p != 0) {
            self.port = port;
        }
        if let Some(latency) = file.latency.filter(|l| *l != 0) {
            self.latency_ms = latency;
        }
        if let Some(data) = file.data_file {
            self.data_path = data;
        }
        self
    }

    /// Apply `MOCKSTREAM_*` environment overrides.
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source. Unparsable values
    /// are ignored.
    pub fn with_vars<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("MOCKSTREAM_HOST").filter(|s| !s.is_empty()) {
            self.host = host;
        }
        if let Some(port) = var("MOCKSTREAM_PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .filter(|p| *p != 0)
        {
            self.port = port;
        }
        if let Some(latency) = var("MOCKSTREAM_LATENCY_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|l| *l != 0)
        {
            self.latency_ms = latency;
        }
        if let Some(data) = var("MOCKSTREAM_DATA").filter(|s| !s.is_empty()) {
            self.data_path = PathBuf::from(data);
        }
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms.max(1))
    }
}
