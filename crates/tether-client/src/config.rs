//! Client configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_transport::frame::{CONN_HEADER, FRAME_MAX_SIZE};

use crate::handshake::HandshakeConfig;

/// Errors from loading or interpreting the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid hex in {field}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    #[error("issuer key must be 32 bytes, got {0}")]
    InvalidIssuerKey(usize),
}

/// Complete client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub certificate: CertificateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path. Empty = $data_dir/tether.db.
    #[serde(default)]
    pub path: String,
}

/// Connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server `host:port`.
    #[serde(default = "default_address")]
    pub address: String,
    /// Deadline for each handshake response.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    /// Frame size limit, capped at what a 3-byte length can express.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Connection header in hex; doubles as the handshake prologue.
    #[serde(default = "default_header_hex")]
    pub header_hex: String,
}

/// Server certificate validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// Ed25519 public key of the certificate issuer, in hex. When unset only
    /// the certified key is checked, not the issuer signature.
    #[serde(default)]
    pub issuer_key_hex: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_address() -> String {
    "g.whatsapp.net:5222".to_string()
}

fn default_handshake_timeout() -> u64 {
    20
}

fn default_max_frame_size() -> usize {
    FRAME_MAX_SIZE
}

fn default_header_hex() -> String {
    hex::encode(CONN_HEADER)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            handshake_timeout_secs: default_handshake_timeout(),
            max_frame_size: default_max_frame_size(),
            header_hex: default_header_hex(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Load from `TETHER_CONFIG`, else `$data_dir/config.toml`.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Runtime handshake settings derived from this configuration.
    pub fn handshake_config(&self) -> Result<HandshakeConfig, ConfigError> {
        let header = hex::decode(&self.connection.header_hex).map_err(|source| {
            ConfigError::InvalidHex {
                field: "connection.header_hex",
                source,
            }
        })?;

        let issuer_key = match &self.certificate.issuer_key_hex {
            Some(encoded) => {
                let raw = hex::decode(encoded).map_err(|source| ConfigError::InvalidHex {
                    field: "certificate.issuer_key_hex",
                    source,
                })?;
                let len = raw.len();
                Some(<[u8; 32]>::try_from(raw).map_err(|_| ConfigError::InvalidIssuerKey(len))?)
            }
            None => None,
        };

        Ok(HandshakeConfig {
            timeout: Duration::from_secs(self.connection.handshake_timeout_secs),
            issuer_key,
            header,
            max_frame_size: self.connection.max_frame_size.min(FRAME_MAX_SIZE),
        })
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var("TETHER_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".tether"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/tether"))
    }

    /// Get the database path.
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_empty() {
            self.data_dir().join("tether.db")
        } else {
            PathBuf::from(&self.store.path)
        }
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TETHER_CONFIG") {
            return PathBuf::from(path);
        }
        Self::default().data_dir().join("config.toml")
    }
}
