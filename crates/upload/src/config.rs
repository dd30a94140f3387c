//! Upload tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default read buffer: 64 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Upload configuration, usually embedded as an `[upload]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Seconds to wait for the client to open the data connection.
    #[serde(default = "default_data_timeout_secs")]
    pub data_timeout_secs: u64,

    /// Bytes read from the data connection per write (0 = default).
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_data_timeout_secs() -> u64 {
    ftpd_data_channel::DATA_READY_TIMEOUT.as_secs()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            data_timeout_secs: default_data_timeout_secs(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl UploadConfig {
    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }

    /// Effective buffer size; never zero.
    pub fn buffer_size(&self) -> usize {
        if self.buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            self.buffer_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = UploadConfig::default();
        assert_eq!(config.data_timeout(), Duration::from_secs(5));
        assert_eq!(config.buffer_size(), 64 * 1024);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: UploadConfig = toml::from_str("data_timeout_secs = 30").unwrap();
        assert_eq!(config.data_timeout_secs, 30);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn zero_buffer_falls_back_to_default() {
        let config: UploadConfig = toml::from_str("buffer_size = 0").unwrap();
        assert_eq!(config.buffer_size(), DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn roundtrip_toml() {
        let config = UploadConfig {
            data_timeout_secs: 12,
            buffer_size: 4096,
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: UploadConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
