use std::env;
use std::time::Duration;

use chrono::NaiveTime;

use crate::delinquency::DEFAULT_STREAK_THRESHOLD;
use crate::events::DEFAULT_EVENT_CAPACITY;

/// top-level engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    pub telemetry: TelemetryConfig,
    pub sweep: SweepConfig,
    pub delinquency: DelinquencyConfig,
    /// events kept in the service journal before the oldest are dropped
    pub event_capacity: usize,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            sweep: SweepConfig::default(),
            delinquency: DelinquencyConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl BillingConfig {
    /// read `.env` when present, then the process environment
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let log_level = env::var("BILLING_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let event_capacity = parse_var("BILLING_EVENT_CAPACITY", DEFAULT_EVENT_CAPACITY)?;

        let batch_size = parse_var("SWEEP_BATCH_SIZE", 500usize)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "SWEEP_BATCH_SIZE",
                value: "0".to_string(),
            });
        }
        let batch_pause_ms = parse_var("SWEEP_BATCH_PAUSE_MS", 100u64)?;
        let lookback_days = parse_var("SWEEP_LOOKBACK_DAYS", 14u32)?;
        let run_at = match env::var("SWEEP_RUN_AT") {
            Ok(value) => NaiveTime::parse_from_str(value.trim(), "%H:%M")
                .map_err(|_| ConfigError::Invalid { key: "SWEEP_RUN_AT", value })?,
            Err(_) => NaiveTime::MIN,
        };
        let streak_threshold = parse_var("DELINQUENCY_STREAK_THRESHOLD", DEFAULT_STREAK_THRESHOLD)?;
        if streak_threshold == 0 {
            return Err(ConfigError::Invalid {
                key: "DELINQUENCY_STREAK_THRESHOLD",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            telemetry: TelemetryConfig { log_level },
            sweep: SweepConfig {
                batch_size,
                batch_pause: Duration::from_millis(batch_pause_ms),
                lookback: chrono::Duration::days(i64::from(lookback_days)),
                run_at,
            },
            delinquency: DelinquencyConfig { streak_threshold },
            event_capacity,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// tracing controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// delinquency sweep throttling and schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    pub batch_size: usize,
    /// sleep between batches, zero disables it
    pub batch_pause: Duration,
    /// loans paid within this window are not candidates
    pub lookback: chrono::Duration,
    /// daily run time, UTC
    pub run_at: NaiveTime,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            batch_pause: Duration::from_millis(100),
            lookback: chrono::Duration::days(14),
            run_at: NaiveTime::MIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelinquencyConfig {
    pub streak_threshold: u32,
}

impl Default for DelinquencyConfig {
    fn default() -> Self {
        Self {
            streak_threshold: DEFAULT_STREAK_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}
