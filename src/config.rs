//! Configuration types for export-tracker

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Remote status endpoint configuration
///
/// Groups settings for reaching the export service.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL of the export service (default: "http://127.0.0.1:8080")
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Polling behavior configuration
///
/// Groups settings for how in-flight tasks are queried.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between status queries while a task is in progress (default: 2 seconds)
    #[serde(default = "default_poll_interval", with = "duration_ms_serde")]
    pub interval: Duration,

    /// Bounded timeout applied to each status query (default: 15 seconds)
    ///
    /// Expiry is treated as a transport failure, which terminates the task.
    #[serde(default = "default_request_timeout", with = "duration_ms_serde")]
    pub request_timeout: Duration,

    /// Reschedule queries from the exponential backoff generator instead of
    /// the fixed interval (default: false)
    #[serde(default)]
    pub use_backoff: bool,

    /// Backoff configuration used when `use_backoff` is set
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            request_timeout: default_request_timeout(),
            use_backoff: false,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Backoff configuration for poll rescheduling
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Floor delay (default: 1 second)
    #[serde(default = "default_min_delay", with = "duration_ms_serde")]
    pub min_delay: Duration,

    /// Ceiling delay (default: 8 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplicative growth per attempt (default: 1.6)
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,

    /// Fraction of the computed delay used as symmetric random jitter (default: 0.2)
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            growth_factor: default_growth_factor(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}

/// Data storage and state configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path to the SQLite database file (default: "./export-tracker.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for the export tracker
///
/// Fields are organized into logical sub-configs:
/// - [`endpoint`](EndpointConfig) — remote status endpoint
/// - [`poll`](PollConfig) — polling cadence, timeout, backoff
/// - [`persistence`](PersistenceConfig) — durable task storage
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote status endpoint settings
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Polling behavior settings
    #[serde(default)]
    pub poll: PollConfig,

    /// Data storage and state management
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_min_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_delay() -> Duration {
    Duration::from_millis(8000)
}

fn default_growth_factor() -> f64 {
    1.6
}

fn default_jitter_ratio() -> f64 {
    0.2
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./export-tracker.db")
}

// Duration serialization helper (delays are configured in milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_poll_cadence_is_a_fixed_two_second_interval() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_millis(2000));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(!config.use_backoff, "fixed-interval polling is the default");
    }

    #[test]
    fn backoff_defaults_span_one_to_eight_seconds() {
        let config = BackoffConfig::default();
        assert_eq!(config.min_delay, Duration::from_millis(1000));
        assert_eq!(config.max_delay, Duration::from_millis(8000));
        assert!((config.growth_factor - 1.6).abs() < f64::EPSILON);
        assert!((config.jitter_ratio - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_json_yields_full_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.endpoint.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.poll.interval, Duration::from_millis(2000));
        assert_eq!(
            config.persistence.database_path,
            PathBuf::from("./export-tracker.db")
        );
    }

    #[test]
    fn durations_round_trip_as_milliseconds() {
        let mut config = Config::default();
        config.poll.interval = Duration::from_millis(250);
        config.poll.backoff.max_delay = Duration::from_millis(4500);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"interval\":250"), "json was: {json}");

        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.poll.interval, Duration::from_millis(250));
        assert_eq!(back.poll.backoff.max_delay, Duration::from_millis(4500));
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let config: Config =
            serde_json::from_str(r#"{"poll": {"use_backoff": true, "interval": 500}}"#).unwrap();
        assert!(config.poll.use_backoff);
        assert_eq!(config.poll.interval, Duration::from_millis(500));
        assert_eq!(config.poll.request_timeout, Duration::from_secs(15));
        assert_eq!(config.poll.backoff.min_delay, Duration::from_millis(1000));
    }
}
