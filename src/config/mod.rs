use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod defaults;
pub mod duration_serde;

use crate::errors::{WorkerError, WorkerResult};
use defaults::*;

/// Default configuration file consulted when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Complete worker configuration.
///
/// Built once at startup and handed to every component behind an `Arc`;
/// nothing reads configuration from global state afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Work queue, notification channel and job store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    /// List producers `LPUSH` serialized jobs onto
    pub queue_key: String,
    /// Pub/sub channel producers publish on after each enqueue
    pub notification_channel: String,
    pub status_key_prefix: String,
    pub result_key_prefix: String,
    /// Wait before resubscribing after the pub/sub connection drops
    #[serde(with = "duration_serde::duration")]
    pub resubscribe_delay: Duration,
}

impl RedisConfig {
    pub fn status_key(&self, job_id: &str) -> String {
        format!("{}:{}", self.status_key_prefix, job_id)
    }

    pub fn result_key(&self, job_id: &str) -> String {
        format!("{}:{}", self.result_key_prefix, job_id)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            notification_channel: DEFAULT_NOTIFICATION_CHANNEL.to_string(),
            status_key_prefix: DEFAULT_STATUS_KEY_PREFIX.to_string(),
            result_key_prefix: DEFAULT_RESULT_KEY_PREFIX.to_string(),
            resubscribe_delay: DEFAULT_RESUBSCRIBE_DELAY,
        }
    }
}

/// Dispatcher, executor and shutdown tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Drain the queue at least this often even without notifications
    #[serde(with = "duration_serde::duration")]
    pub idle_interval: Duration,
    /// Per-attempt blocking pop timeout; an empty pop ends a drain pass
    #[serde(with = "duration_serde::duration")]
    pub pop_timeout: Duration,
    /// Budget for one job, measured from dispatch
    #[serde(with = "duration_serde::duration")]
    pub job_deadline: Duration,
    /// How long shutdown waits for in-flight jobs
    #[serde(with = "duration_serde::duration")]
    pub shutdown_grace: Duration,
    /// Expiry applied to every status and result write
    #[serde(with = "duration_serde::duration")]
    pub retention: Duration,
    pub max_concurrent_jobs: usize,
    /// Buffered wake-ups before notifications start coalescing
    pub notification_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_interval: DEFAULT_IDLE_INTERVAL,
            pop_timeout: DEFAULT_POP_TIMEOUT,
            job_deadline: DEFAULT_JOB_DEADLINE,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            retention: DEFAULT_RETENTION,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

/// External generation service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    #[serde(with = "duration_serde::duration")]
    pub connect_timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GENERATION_BASE_URL.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl Config {
    /// Load defaults, then the TOML file (if present), then the environment.
    pub fn load_from_file(config_file: impl AsRef<Path>) -> WorkerResult<Self> {
        let config: Config = Self::figment(config_file.as_ref())
            .extract()
            .map_err(|e| WorkerError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Provider chain; later providers win.
    ///
    /// `REDIS_URL` and `GEMINI_API_KEY` are honoured for compatibility with
    /// existing deployments, but the prefixed variables take precedence.
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(
                Env::raw()
                    .only(&[LEGACY_REDIS_URL_ENV])
                    .map(|_| "redis.url".into()),
            )
            .merge(
                Env::raw()
                    .only(&[LEGACY_API_KEY_ENV])
                    .map(|_| "generation.api_key".into()),
            )
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> WorkerResult<()> {
        let worker = &self.worker;
        if worker.pop_timeout.is_zero() {
            return Err(WorkerError::configuration(
                "worker.pop_timeout must be greater than zero",
            ));
        }
        if worker.idle_interval.is_zero() {
            return Err(WorkerError::configuration(
                "worker.idle_interval must be greater than zero",
            ));
        }
        if worker.job_deadline.is_zero() {
            return Err(WorkerError::configuration(
                "worker.job_deadline must be greater than zero",
            ));
        }
        // Redis expiry has whole-second resolution
        if worker.retention < Duration::from_secs(1) {
            return Err(WorkerError::configuration(
                "worker.retention must be at least one second",
            ));
        }
        if worker.max_concurrent_jobs == 0 {
            return Err(WorkerError::configuration(
                "worker.max_concurrent_jobs must be at least 1",
            ));
        }
        if worker.notification_capacity == 0 {
            return Err(WorkerError::configuration(
                "worker.notification_capacity must be at least 1",
            ));
        }
        if self.redis.queue_key.trim().is_empty() {
            return Err(WorkerError::configuration("redis.queue_key must not be empty"));
        }
        Ok(())
    }

    /// Validation for the long-running worker, which also needs credentials.
    pub fn validate_for_worker(&self) -> WorkerResult<()> {
        self.validate()?;
        match self.generation.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(WorkerError::configuration(format!(
                "generation.api_key is required (set {LEGACY_API_KEY_ENV} or {ENV_PREFIX}GENERATION__API_KEY)"
            ))),
        }
    }

    /// Copy safe to print: secrets replaced.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.generation.api_key.is_some() {
            config.generation.api_key = Some("<redacted>".to_string());
        }
        config
    }

    pub fn to_toml(&self) -> WorkerResult<String> {
        toml::to_string_pretty(self).map_err(|e| WorkerError::configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker.idle_interval, Duration::from_secs(300));
        assert_eq!(config.worker.pop_timeout, Duration::from_secs(1));
        assert_eq!(config.worker.retention, Duration::from_secs(86_400));
        assert_eq!(config.redis.queue_key, "presentation_Task_queue");
    }

    #[test]
    fn test_worker_validation_requires_api_key() {
        let mut config = Config::default();
        assert!(matches!(
            config.validate_for_worker(),
            Err(WorkerError::Configuration { .. })
        ));

        config.generation.api_key = Some("key".to_string());
        assert!(config.validate_for_worker().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.worker.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_key_helpers() {
        let redis = RedisConfig::default();
        assert_eq!(redis.status_key("abc"), "job_status:abc");
        assert_eq!(redis.result_key("abc"), "presentation:abc");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load_from_file("does-not-exist.toml").expect("defaults load");
            assert_eq!(config.worker.max_concurrent_jobs, DEFAULT_MAX_CONCURRENT_JOBS);
            Ok(())
        });
    }

    #[test]
    fn test_file_and_environment_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "worker.toml",
                r#"
                [redis]
                url = "redis://file:6379"

                [worker]
                idle_interval = "30s"
                max_concurrent_jobs = 4
                "#,
            )?;
            jail.set_env("PRESENTATION_WORKER_WORKER__MAX_CONCURRENT_JOBS", "8");
            jail.set_env("REDIS_URL", "redis://legacy:6379");
            jail.set_env("GEMINI_API_KEY", "from-env");

            let config = Config::load_from_file("worker.toml").expect("config loads");
            assert_eq!(config.worker.idle_interval, Duration::from_secs(30));
            assert_eq!(config.worker.max_concurrent_jobs, 8);
            assert_eq!(config.redis.url, "redis://legacy:6379");
            assert_eq!(config.generation.api_key.as_deref(), Some("from-env"));
            // untouched values keep their defaults
            assert_eq!(config.worker.pop_timeout, Duration::from_secs(1));
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_beats_legacy_variable() {
        Jail::expect_with(|jail| {
            jail.set_env("REDIS_URL", "redis://legacy:6379");
            jail.set_env("PRESENTATION_WORKER_REDIS__URL", "redis://prefixed:6379");

            let config = Config::load_from_file("config.toml").expect("config loads");
            assert_eq!(config.redis.url, "redis://prefixed:6379");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_duration_is_a_configuration_error() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.toml", "[worker]\npop_timeout = \"soon\"\n")?;
            let result = Config::load_from_file("bad.toml");
            assert!(matches!(result, Err(WorkerError::Configuration { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_redacted_toml_hides_api_key() {
        let mut config = Config::default();
        config.generation.api_key = Some("super-secret".to_string());
        let rendered = config.redacted().to_toml().unwrap();
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains(r#"idle_interval = "5m""#));
    }
}
