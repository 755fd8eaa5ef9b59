use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// RADIUS server: host, host:port, [v6]:port, or a stream socket path
    #[serde(default = "default_server")]
    pub server: String,

    /// Shared secret
    #[serde(default)]
    pub secret: String,

    /// Total time budget per request in milliseconds, across all
    /// addresses and retries (default: 3000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retransmissions per address after the first attempt (default: 3)
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// NAS-Identifier sent with every request
    #[serde(default)]
    pub nas_identifier: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info")
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_server() -> String {
    "127.0.0.1".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_retries() -> usize {
    3
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server: default_server(),
            secret: String::new(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            nas_identifier: None,
            log_level: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether the server is reached over a local stream socket
    pub fn is_stream(&self) -> bool {
        self.server.starts_with('/')
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.is_empty() {
            return Err(ConfigError::Invalid("Server cannot be empty".to_string()));
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("Timeout cannot be 0".to_string()));
        }

        // UDP packets are only protected by the secret
        if self.secret.is_empty() && !self.is_stream() {
            return Err(ConfigError::Invalid(format!(
                "Secret cannot be empty for UDP server {}",
                self.server
            )));
        }

        if let Some(ref nas_identifier) = self.nas_identifier
            && (nas_identifier.is_empty() || nas_identifier.len() > 253)
        {
            return Err(ConfigError::Invalid(format!(
                "NAS-Identifier must be 1-253 bytes, got {}",
                nas_identifier.len()
            )));
        }

        Ok(())
    }

    /// Create an example configuration file
    pub fn example() -> Self {
        ClientConfig {
            server: "radius.example.com:1812".to_string(),
            secret: "testing123".to_string(),
            timeout_ms: 3000,
            retries: 3,
            nas_identifier: Some("nas01".to_string()),
            log_level: Some("info".to_string()),
        }
    }
}
