//! Bridge configuration, loaded from YAML
//!
//! Every field has a default, so a partial file (or none at all) still yields
//! a usable configuration. A few deployment knobs can be overridden from the
//! environment.

use crate::pacing::DelayRange;
use crate::platforms::Timeouts;
use crate::BridgeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const ENV_RECEIVE_URL: &str = "JAVA_RECEIVE_URL";
pub const ENV_SERVER_HOST: &str = "SIDECAR_SERVER_HOST";
pub const ENV_SERVER_PORT: &str = "SIDECAR_SERVER_PORT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub java: JavaConfig,
    pub window: WindowConfig,
    pub listener: ListenerConfig,
    pub executor: ExecutorConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Downstream receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JavaConfig {
    /// Empty disables delivery.
    pub receive_url: String,
    pub timeout_seconds: f64,
    pub retry_max: u32,
    pub retry_backoff_base_seconds: f64,
}

impl Default for JavaConfig {
    fn default() -> Self {
        Self {
            receive_url: "http://localhost:8080/api/wechat/receive".to_string(),
            timeout_seconds: 5.0,
            retry_max: 3,
            retry_backoff_base_seconds: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub class_name: String,
    pub name: String,
    pub process_names: Vec<String>,
    pub search_timeout_ms: u64,
    pub transaction_timeout_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            class_name: "mmui::MainWindow".to_string(),
            name: "微信".to_string(),
            process_names: vec!["WeChat.exe".to_string(), "Weixin.exe".to_string()],
            search_timeout_ms: 500,
            transaction_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub scan_interval_seconds: f64,
    pub scan_jitter_seconds: f64,
    pub unread_max_per_round: usize,
    pub message_scan_limit: usize,
    pub unread_scan_interval_min_seconds: f64,
    pub unread_scan_interval_max_seconds: f64,
    pub guard_popups: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            scan_interval_seconds: 0.6,
            scan_jitter_seconds: 0.3,
            unread_max_per_round: 5,
            message_scan_limit: 10,
            unread_scan_interval_min_seconds: 1.5,
            unread_scan_interval_max_seconds: 4.0,
            guard_popups: false,
        }
    }
}

impl ListenerConfig {
    /// Range the gap between unread passes is drawn from.
    pub fn unread_interval(&self) -> DelayRange {
        DelayRange::from_secs(
            self.unread_scan_interval_min_seconds,
            self.unread_scan_interval_max_seconds,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Dwell before a simulated click lands.
    pub click_move_min_seconds: f64,
    pub click_move_max_seconds: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            click_move_min_seconds: 0.18,
            click_move_max_seconds: 0.55,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 51234,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: PathBuf,
    pub level: String,
    /// Rotated files kept on disk.
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("wechat_bridge.log"),
            level: "INFO".to_string(),
            max_files: 3,
        }
    }
}

impl BridgeConfig {
    /// Load from `path`, apply environment overrides and normalize.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                BridgeError::Config(format!("cannot read {}: {}", path.display(), e))
            })?;
            Self::from_yaml(&raw)?
        } else {
            info!("config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.resolve_paths(&base_dir);
        config.normalize();
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, BridgeError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| BridgeError::Config(format!("invalid YAML: {}", e)))
    }

    /// Apply the environment overrides, reading variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_RECEIVE_URL).filter(|v| !v.is_empty()) {
            self.java.receive_url = url;
        }
        if let Some(host) = lookup(ENV_SERVER_HOST).filter(|v| !v.is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_SERVER_PORT).filter(|v| !v.is_empty()) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("ignoring unparsable {}={}", ENV_SERVER_PORT, port),
            }
        }
    }

    /// Make a relative log file path relative to `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        if self.logging.file.is_relative() {
            self.logging.file = base_dir.join(&self.logging.file);
        }
    }

    /// Swap inverted min/max pairs.
    pub fn normalize(&mut self) {
        let listener = &mut self.listener;
        if listener.unread_scan_interval_min_seconds > listener.unread_scan_interval_max_seconds {
            std::mem::swap(
                &mut listener.unread_scan_interval_min_seconds,
                &mut listener.unread_scan_interval_max_seconds,
            );
        }
        let executor = &mut self.executor;
        if executor.click_move_min_seconds > executor.click_move_max_seconds {
            std::mem::swap(
                &mut executor.click_move_min_seconds,
                &mut executor.click_move_max_seconds,
            );
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            search: Duration::from_millis(self.window.search_timeout_ms),
            transaction: Duration::from_millis(self.window.transaction_timeout_ms),
        }
    }

    pub fn click_move(&self) -> DelayRange {
        DelayRange::from_secs(
            self.executor.click_move_min_seconds,
            self.executor.click_move_max_seconds,
        )
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
