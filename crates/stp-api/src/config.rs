//! # Service Configuration
//!
//! Read once from the environment at startup and shared read-only through
//! [`AppState`](crate::state::AppState) afterwards.
//!
//! | Variable                  | Default         |
//! |---------------------------|-----------------|
//! | `THUMBNAIL_CACHE`         | `./thumbnails`  |
//! | `STP_SERVICE_HOST`        | `127.0.0.1`     |
//! | `STP_SERVICE_PORT`        | `5001`          |
//! | `STP_ENGINE_CMD`          | `stp-convert`   |
//! | `STP_ENGINE_TIMEOUT_SECS` | `120`           |
//! | `STP_STAGING_DIR`         | system temp dir |
//! | `STP_METRICS_ENABLED`     | `true`          |
//! | `STP_LOG_FORMAT`          | `text` (`json`) |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Invalid configuration value.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Process-wide configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub cache_dir: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub engine_program: PathBuf,
    pub engine_timeout: Duration,
    /// Where uploads are staged for the engine; `None` uses the system temp dir.
    pub staging_dir: Option<PathBuf>,
    pub metrics_enabled: bool,
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./thumbnails"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 5001,
            engine_program: PathBuf::from("stp-convert"),
            engine_timeout: Duration::from_secs(120),
            staging_dir: None,
            metrics_enabled: true,
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("THUMBNAIL_CACHE") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(host) = get("STP_SERVICE_HOST") {
            config.host = parse("STP_SERVICE_HOST", &host)?;
        }
        if let Some(port) = get("STP_SERVICE_PORT") {
            config.port = parse("STP_SERVICE_PORT", &port)?;
        }
        if let Some(program) = get("STP_ENGINE_CMD") {
            config.engine_program = PathBuf::from(program);
        }
        if let Some(secs) = get("STP_ENGINE_TIMEOUT_SECS") {
            let secs: u64 = parse("STP_ENGINE_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var: "STP_ENGINE_TIMEOUT_SECS",
                    value: secs.to_string(),
                    reason: "must be at least 1".into(),
                });
            }
            config.engine_timeout = Duration::from_secs(secs);
        }
        config.staging_dir = get("STP_STAGING_DIR").map(PathBuf::from);
        if let Some(flag) = get("STP_METRICS_ENABLED") {
            config.metrics_enabled = flag.to_lowercase() != "false";
        }
        if let Some(format) = get("STP_LOG_FORMAT") {
            config.log_json = format.eq_ignore_ascii_case("json");
        }
        Ok(config)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:5001");
    }

    #[test]
    fn overrides_from_environment() {
        let config = load(&[
            ("THUMBNAIL_CACHE", "/var/cache/stp"),
            ("STP_SERVICE_PORT", "8088"),
            ("STP_SERVICE_HOST", "0.0.0.0"),
            ("STP_ENGINE_CMD", "/opt/cad/convert"),
            ("STP_ENGINE_TIMEOUT_SECS", "30"),
            ("STP_STAGING_DIR", "/tmp/stp"),
            ("STP_METRICS_ENABLED", "FALSE"),
            ("STP_LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/stp"));
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:8088");
        assert_eq!(config.engine_program, PathBuf::from("/opt/cad/convert"));
        assert_eq!(config.engine_timeout, Duration::from_secs(30));
        assert_eq!(config.staging_dir, Some(PathBuf::from("/tmp/stp")));
        assert!(!config.metrics_enabled);
        assert!(config.log_json);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("STP_SERVICE_PORT", "  "), ("THUMBNAIL_CACHE", "")]).unwrap();
        assert_eq!(config.port, 5001);
        assert_eq!(config.cache_dir, PathBuf::from("./thumbnails"));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = load(&[("STP_SERVICE_PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "STP_SERVICE_PORT", .. }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(load(&[("STP_ENGINE_TIMEOUT_SECS", "0")]).is_err());
    }
}
