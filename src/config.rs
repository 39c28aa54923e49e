//! Environment-driven configuration.
//!
//! All settings come from environment variables (optionally seeded from a
//! `.env` file by the binary). Configuration is carried as plain structs;
//! nothing here is process-global.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Connection details for the Redis job store.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

/// Where task containers report back to, and which overlay network they join.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Hostname task containers use to reach this service.
    pub host: String,
    /// Port task containers use to reach this service.
    pub port: u16,
    /// Name of the overlay network task services attach to.
    pub network: String,
}

/// Tunables for the scheduling engine.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on concurrently running tasks across all jobs.
    pub capacity: usize,
    /// How often the dead-task sweep runs.
    pub dead_scan_interval: Duration,
    /// How often the completed-job sweep runs.
    pub completed_scan_interval: Duration,
    /// Age at which a running task is declared dead and requeued.
    pub dead_after: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: 12,
            dead_scan_interval: Duration::from_secs(600),
            completed_scan_interval: Duration::from_secs(60),
            dead_after: Duration::from_secs(30 * 60),
        }
    }
}

impl SchedulerConfig {
    /// Set the running-set capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the liveness timeout.
    pub fn with_dead_after(mut self, dead_after: Duration) -> Self {
        self.dead_after = dead_after;
        self
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port (`SWARMER_PORT`, default 8500).
    pub listen_port: u16,
    pub redis: RedisConfig,
    /// Docker socket (`DOCKER_SOCKET_PATH`, default `unix://var/run/docker.sock`).
    pub docker_socket: String,
    pub runner: RunnerConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Build the full configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut scheduler = SchedulerConfig::default();
        if let Some(capacity) = optional("SWARMER_QUEUE_LEN") {
            scheduler.capacity = parse("SWARMER_QUEUE_LEN", &capacity)?;
        }

        Ok(Self {
            listen_port: match optional("SWARMER_PORT") {
                Some(port) => parse("SWARMER_PORT", &port)?,
                None => 8500,
            },
            redis: RedisConfig {
                host: require("REDIS_TARGET")?,
                port: parse("REDIS_PORT", &require("REDIS_PORT")?)?,
            },
            docker_socket: optional("DOCKER_SOCKET_PATH")
                .unwrap_or_else(|| "unix://var/run/docker.sock".to_string()),
            runner: RunnerConfig {
                host: require("RUNNER_HOST_NAME")?,
                port: parse("RUNNER_PORT", &require("RUNNER_PORT")?)?,
                network: require("RUNNER_NETWORK")?,
            },
            scheduler,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnv { name })
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        name,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.capacity, 12);
        assert_eq!(config.dead_scan_interval, Duration::from_secs(600));
        assert_eq!(config.completed_scan_interval, Duration::from_secs(60));
        assert_eq!(config.dead_after, Duration::from_secs(1800));
    }

    #[test]
    fn test_scheduler_config_builders() {
        let config = SchedulerConfig::default()
            .with_capacity(2)
            .with_dead_after(Duration::from_secs(5));
        assert_eq!(config.capacity, 2);
        assert_eq!(config.dead_after, Duration::from_secs(5));
    }

    #[test]
    fn test_redis_url() {
        let redis = RedisConfig {
            host: "cache.internal".into(),
            port: 6379,
        };
        assert_eq!(redis.url(), "redis://cache.internal:6379");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse::<u16>("SWARMER_PORT", "not-a-port").is_err());
        let port: u16 = parse("SWARMER_PORT", "8500").unwrap();
        assert_eq!(port, 8500);
    }
}
