//! Worker configuration.
//!
//! Everything comes from the environment. The binary loads a `.env` file first
//! with `dotenvy`, so the same keys work in both places.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use rendition_common::ActivationContext;

use crate::logging::LogFormat;
use crate::{Error, Result};

pub const ENV_WORK_DIR: &str = "RENDITION_WORK_DIR";
pub const ENV_DEADLINE_MS: &str = "ACTIVATION_DEADLINE_MS";
pub const ENV_FLUSH_MARGIN_MS: &str = "DEADLINE_FLUSH_MARGIN_MS";
pub const ENV_SAMPLE_INTERVAL_MS: &str = "RESOURCE_SAMPLE_INTERVAL_MS";
pub const ENV_MAX_RENDITION_SIZE: &str = "MAX_RENDITION_SIZE";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const ENV_LOG_DIR: &str = "LOG_DIR";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

const DEFAULT_FLUSH_MARGIN_MS: u64 = 1000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Runtime settings of the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Base directory; each activation works in `<work_dir>/<activation_id>`.
    pub work_dir: PathBuf,
    /// Hard external deadline of the activation.
    pub deadline: Option<SystemTime>,
    /// How long before the deadline metrics are flushed.
    pub flush_margin: Duration,
    /// Resource sampling interval; `None` disables the sampler.
    pub resource_sample_interval: Option<Duration>,
    /// Largest rendition accepted for upload, in bytes.
    pub max_rendition_size: Option<u64>,
    pub http_timeout: Duration,
    pub log_dir: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("rendition-worker"),
            deadline: None,
            flush_margin: Duration::from_millis(DEFAULT_FLUSH_MARGIN_MS),
            resource_sample_interval: None,
            max_rendition_size: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            log_dir: None,
            log_format: LogFormat::Text,
        }
    }
}

impl WorkerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset and blank keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(ENV_WORK_DIR) {
            config.work_dir = PathBuf::from(dir);
        }
        if let Some(ms) = parse::<u64>(ENV_DEADLINE_MS, get(ENV_DEADLINE_MS))? {
            config.deadline = Some(ActivationContext::deadline_from_epoch_ms(ms));
        }
        if let Some(ms) = parse::<u64>(ENV_FLUSH_MARGIN_MS, get(ENV_FLUSH_MARGIN_MS))? {
            config.flush_margin = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(ENV_SAMPLE_INTERVAL_MS, get(ENV_SAMPLE_INTERVAL_MS))? {
            config.resource_sample_interval = (ms > 0).then(|| Duration::from_millis(ms));
        }
        config.max_rendition_size =
            parse::<u64>(ENV_MAX_RENDITION_SIZE, get(ENV_MAX_RENDITION_SIZE))?;
        if let Some(secs) = parse::<u64>(ENV_HTTP_TIMEOUT_SECS, get(ENV_HTTP_TIMEOUT_SECS))? {
            if secs == 0 {
                return Err(Error::config(format!("{} must be positive", ENV_HTTP_TIMEOUT_SECS)));
            }
            config.http_timeout = Duration::from_secs(secs);
        }
        config.log_dir = get(ENV_LOG_DIR).map(PathBuf::from);
        if let Some(format) = get(ENV_LOG_FORMAT) {
            config.log_format = format.parse()?;
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| Error::config(format!("invalid {} '{}': {}", key, v, e)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.flush_margin, Duration::from_secs(1));
        assert_eq!(config.resource_sample_interval, None);
    }

    #[test]
    fn test_overrides() {
        let config = WorkerConfig::from_lookup(lookup(&[
            (ENV_WORK_DIR, "/var/work"),
            (ENV_DEADLINE_MS, "1700000000000"),
            (ENV_FLUSH_MARGIN_MS, "250"),
            (ENV_SAMPLE_INTERVAL_MS, "100"),
            (ENV_MAX_RENDITION_SIZE, "1048576"),
            (ENV_LOG_FORMAT, "json"),
            (ENV_LOG_DIR, " "),
        ]))
        .unwrap();

        assert_eq!(config.work_dir, PathBuf::from("/var/work"));
        assert_eq!(
            config.deadline,
            Some(SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_000))
        );
        assert_eq!(config.flush_margin, Duration::from_millis(250));
        assert_eq!(config.resource_sample_interval, Some(Duration::from_millis(100)));
        assert_eq!(config.max_rendition_size, Some(1_048_576));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn test_invalid_values() {
        let err = WorkerConfig::from_lookup(lookup(&[(ENV_DEADLINE_MS, "soon")])).unwrap_err();
        assert!(err.to_string().contains(ENV_DEADLINE_MS));

        assert!(WorkerConfig::from_lookup(lookup(&[(ENV_HTTP_TIMEOUT_SECS, "0")])).is_err());
        assert!(WorkerConfig::from_lookup(lookup(&[(ENV_LOG_FORMAT, "xml")])).is_err());
    }

    #[test]
    fn test_zero_sample_interval_disables_sampler() {
        let config =
            WorkerConfig::from_lookup(lookup(&[(ENV_SAMPLE_INTERVAL_MS, "0")])).unwrap();
        assert_eq!(config.resource_sample_interval, None);
    }
}
