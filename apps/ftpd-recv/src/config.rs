//! Receiver configuration.
//!
//! Stored as TOML, by default at `~/.config/ftpd/recv.toml`. A missing file
//! means defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ftpd_upload::UploadConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory uploads are written under.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Passive data listener address (port 0 = auto-assign).
    #[serde(default = "default_data_addr")]
    pub data_addr: SocketAddr,

    #[serde(default)]
    pub upload: UploadConfig,
}

fn default_root() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_data_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            data_addr: default_data_addr(),
            upload: UploadConfig::default(),
        }
    }
}

impl Config {
    /// Loads `path`, or the default location when `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.map_or_else(config_path, Path::to_path_buf);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("ftpd").join("recv.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config").join("ftpd").join("recv.toml")
    }
}
