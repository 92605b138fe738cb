use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::fs;
use tracing::debug;
use crate::error::InspectError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectConfig {
    /// Port the cluster members listen on inside their pods.
    #[serde(default = "default_remote_port")]
    pub remote_port: u16,
    #[serde(default)]
    pub tunnel: TunnelConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_stop_grace")]
    pub stop_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_query_timeout")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for JSON log files; console only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            remote_port: default_remote_port(),
            tunnel: TunnelConfig::default(),
            query: QueryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            ready_timeout_ms: default_ready_timeout(),
            attempts: default_attempts(),
            stop_grace_ms: default_stop_grace(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_query_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_remote_port() -> u16 {
    6379
}

fn default_ready_timeout() -> u64 {
    2000
}

fn default_attempts() -> u32 {
    3
}

fn default_stop_grace() -> u64 {
    500
}

fn default_query_timeout() -> u64 {
    5000
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl TunnelConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl InspectConfig {
    /// Loads `explicit` if given, otherwise the first config file found in the
    /// usual locations, otherwise the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, InspectError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let config_paths = [
            PathBuf::from("rediscluster.yml"),
            dirs::config_dir()
                .map(|p| p.join("rediscluster-inspect/config.yml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                return Self::load_from_file(path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, InspectError> {
        let content = fs::read_to_string(path).map_err(|e| {
            InspectError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            InspectError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InspectError> {
        if self.remote_port == 0 {
            return Err(InspectError::config("remote_port must be non-zero"));
        }
        if self.tunnel.attempts == 0 {
            return Err(InspectError::config("tunnel.attempts must be at least 1"));
        }
        if self.tunnel.ready_timeout_ms == 0 || self.query.timeout_ms == 0 {
            return Err(InspectError::config("timeouts must be non-zero"));
        }
        Ok(())
    }
}
