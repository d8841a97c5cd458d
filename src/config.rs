//! Configuration for the PDP server.
//!
//! Loaded from environment variables with an `MPE_` prefix, layered on
//! top of an optional JSON file located via `MPE_CONFIG_PATH` /
//! `MPE_CONFIG_FILENAME`, with defaults under both.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auxdata: AuxdataConfig,
    pub access_log: AccessLogConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuxdataConfig {
    /// File providing default principal-augmentation data.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogConfig {
    /// Channel capacity for the bounded-channel access log sink.
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            auxdata: AuxdataConfig::default(),
            access_log: AccessLogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        AccessLogConfig { depth: 1024 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// A fully-optional mirror of [`Config`] as read from the JSON config
/// file: every field is absent unless the file sets it, so it can be
/// layered under environment overrides without clobbering defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialConfig {
    server: PartialServerConfig,
    auxdata: AuxdataConfig,
    access_log: PartialAccessLogConfig,
    logging: PartialLoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialServerConfig {
    host: Option<String>,
    port: Option<u16>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialAccessLogConfig {
    depth: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialLoggingConfig {
    level: Option<String>,
    format: Option<String>,
}

impl Config {
    /// Builds configuration from defaults, an optional JSON file
    /// located via `MPE_CONFIG_PATH`/`MPE_CONFIG_FILENAME`, and
    /// `MPE_`-prefixed environment variables, each layer overriding the
    /// last.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_file();
        config.apply_env();
        config
    }

    fn apply_file(&mut self) {
        let Ok(dir) = env::var("MPE_CONFIG_PATH") else {
            return;
        };
        let filename = env::var("MPE_CONFIG_FILENAME").unwrap_or_else(|_| "config.json".to_string());
        let path: PathBuf = [dir, filename].iter().collect();

        let Ok(contents) = fs::read_to_string(&path) else {
            tracing::warn!(path = %path.display(), "config file not readable, skipping");
            return;
        };
        let partial: PartialConfig = match serde_json::from_str(&contents) {
            Ok(partial) => partial,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "config file is malformed JSON, skipping");
                return;
            }
        };

        if let Some(host) = partial.server.host {
            self.server.host = host;
        }
        if let Some(port) = partial.server.port {
            self.server.port = port;
        }
        if let Some(timeout) = partial.server.request_timeout_secs {
            self.server.request_timeout_secs = timeout;
        }
        if partial.auxdata.path.is_some() {
            self.auxdata.path = partial.auxdata.path;
        }
        if let Some(depth) = partial.access_log.depth {
            self.access_log.depth = depth;
        }
        if let Some(level) = partial.logging.level {
            self.logging.level = level;
        }
        if let Some(format) = partial.logging.format {
            self.logging.format = format;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(host) = env::var("MPE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("MPE_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(timeout) = env::var("MPE_SERVER_REQUEST_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                self.server.request_timeout_secs = timeout;
            }
        }
        if let Ok(path) = env::var("MPE_AUXDATA_PATH") {
            self.auxdata.path = Some(path);
        }
        if let Ok(depth) = env::var("MPE_ACCESS_LOG_DEPTH") {
            if let Ok(depth) = depth.parse() {
                self.access_log.depth = depth;
            }
        }
        if let Ok(level) = env::var("MPE_LOGGING_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("MPE_LOGGING_FORMAT") {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server port cannot be 0".to_string());
        }
        if self.server.request_timeout_secs == 0 {
            return Err("request timeout cannot be 0".to_string());
        }
        if self.access_log.depth == 0 {
            return Err("access log depth cannot be 0".to_string());
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "invalid log level '{}'. Valid values: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(format!(
                "invalid log format '{}'. Valid values: {}",
                self.logging.format,
                valid_formats.join(", ")
            ));
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
