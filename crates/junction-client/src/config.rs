use std::path::{Path, PathBuf};
use std::time::Duration;

use junction_common::ConfigError;
use serde::{Deserialize, Serialize};
use tonic::codec::CompressionEncoding;

pub const DEFAULT_SOCKET_PATH: &str = "/run/junctiond.sock";

pub const ENV_SOCKET: &str = "JUNCTIOND_SOCKET";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "JUNCTIOND_CONNECT_TIMEOUT_MS";
pub const ENV_CALL_TIMEOUT_MS: &str = "JUNCTIOND_CALL_TIMEOUT_MS";
pub const ENV_COMPRESSION: &str = "JUNCTIOND_COMPRESSION";
pub const ENV_EAGER_CONNECT: &str = "JUNCTIOND_EAGER_CONNECT";

/// When the transport dials the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectMode {
    /// Dial on the first call. Failures show up as that call's error.
    #[default]
    Lazy,
    /// Dial during open and fail open if the daemon is unreachable.
    Eager,
}

/// Payload compression negotiated for every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Gzip,
    Disabled,
}

impl Compression {
    pub fn encoding(self) -> Option<CompressionEncoding> {
        match self {
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Disabled => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub socket_path: PathBuf,
    pub connect_mode: ConnectMode,
    /// Upper bound on dialing the socket.
    pub connect_timeout: Duration,
    /// Applied to calls whose context carries no deadline.
    pub call_timeout: Option<Duration>,
    pub compression: Compression,
    pub max_decoding_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            connect_mode: ConnectMode::Lazy,
            connect_timeout: Duration::from_secs(5),
            call_timeout: None,
            compression: Compression::Gzip,
            max_decoding_message_size: 4 * 1024 * 1024,
        }
    }
}

impl ClientConfig {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_connect_mode(mut self, mode: ConnectMode) -> Self {
        self.connect_mode = mode;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_max_decoding_message_size(mut self, limit: usize) -> Self {
        self.max_decoding_message_size = limit;
        self
    }

    /// Reads the `JUNCTIOND_*` variables, loading a `.env` file first if
    /// one is present. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_SOCKET) {
            config.socket_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            config.connect_timeout = parse_millis(ENV_CONNECT_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CALL_TIMEOUT_MS) {
            config.call_timeout = Some(parse_millis(ENV_CALL_TIMEOUT_MS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_COMPRESSION) {
            config.compression = match raw.trim().to_ascii_lowercase().as_str() {
                "gzip" => Compression::Gzip,
                "none" | "off" | "disabled" => Compression::Disabled,
                _ => return Err(invalid(ENV_COMPRESSION, &raw, "expected gzip or none")),
            };
        }
        if let Some(raw) = lookup(ENV_EAGER_CONNECT) {
            config.connect_mode = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => ConnectMode::Eager,
                "0" | "false" | "no" => ConnectMode::Lazy,
                _ => return Err(invalid(ENV_EAGER_CONNECT, &raw, "expected a boolean")),
            };
        }

        Ok(config)
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| invalid(key, raw, &e.to_string()))
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
