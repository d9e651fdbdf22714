//! Server configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Smallest outbox that can hold a move together with its board state.
pub const MIN_OUTBOX_CAPACITY: usize = 2;

/// Settings for the session server.
///
/// Loaded from TOML; every field has a default so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    host: String,

    /// Port to bind.
    port: u16,

    /// Page title served at `/`.
    title: String,

    /// Starting position as FEN. Standard start when absent.
    starting_fen: Option<String>,

    /// Send `invalidMove` back to the sender of a dropped move.
    notify_rejections: bool,

    /// Per-connection outgoing queue length, at least [`MIN_OUTBOX_CAPACITY`].
    outbox_capacity: usize,

    /// Hub inbound event queue length.
    event_capacity: usize,

    /// Tracing filter used when `RUST_LOG` is unset.
    log_filter: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            title: "My Chess.com".to_string(),
            starting_fen: None,
            notify_rejections: false,
            outbox_capacity: 64,
            event_capacity: 256,
            log_filter: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        info!(host = %config.host, port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbox_capacity < MIN_OUTBOX_CAPACITY {
            return Err(ConfigError::new(format!(
                "outbox_capacity must be at least {}, got {}",
                MIN_OUTBOX_CAPACITY, self.outbox_capacity
            )));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::new("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Address string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
