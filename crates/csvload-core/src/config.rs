//! Pipeline configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default number of insert workers.
pub const DEFAULT_WORKERS: usize = 100;

/// Default number of successful inserts between per-worker progress logs.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100;

/// Default maximum persist attempts per row.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default backoff before the first re-attempt, in milliseconds.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;

/// Default backoff ceiling, in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;

/// Policy for data rows whose field count differs from the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArityPolicy {
    /// Abort the run with a diagnostic
    #[default]
    Abort,
    /// Skip the row and count it in the report
    Skip,
    /// Truncate extra fields, pad missing fields with empty strings
    Coerce,
}

impl std::str::FromStr for ArityPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(ArityPolicy::Abort),
            "skip" => Ok(ArityPolicy::Skip),
            "coerce" => Ok(ArityPolicy::Coerce),
            _ => Err(anyhow::anyhow!("Invalid arity policy: {}", s)),
        }
    }
}

impl std::fmt::Display for ArityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArityPolicy::Abort => write!(f, "abort"),
            ArityPolicy::Skip => write!(f, "skip"),
            ArityPolicy::Coerce => write!(f, "coerce"),
        }
    }
}

/// Bounded retry policy for persist failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per row, including the first
    pub max_attempts: u32,
    /// Backoff before the first re-attempt
    pub initial_backoff_ms: u64,
    /// Backoff ceiling
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    /// Backoff to sleep after the given failed attempt (1-based).
    ///
    /// Exponential: `initial * 2^(attempt-1)`, capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let ms = if exp >= 32 {
            self.max_backoff_ms
        } else {
            self.initial_backoff_ms
                .saturating_mul(1u64 << exp)
                .min(self.max_backoff_ms)
        };
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Worker pool size
    pub workers: usize,
    /// Successful inserts between per-worker progress logs
    pub progress_interval: u64,
    /// Policy for rows with a field count other than the schema's
    pub arity: ArityPolicy,
    /// Retry policy for persist failures
    pub retry: RetryPolicy,
}

impl LoadConfig {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            anyhow::bail!("Worker count must be greater than 0");
        }

        if self.progress_interval == 0 {
            anyhow::bail!("Progress interval must be greater than 0");
        }

        if self.retry.max_attempts == 0 {
            anyhow::bail!("Retry max_attempts must be greater than 0");
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            anyhow::bail!(
                "Retry initial backoff ({}ms) cannot be greater than max backoff ({}ms)",
                self.retry.initial_backoff_ms,
                self.retry.max_backoff_ms
            );
        }

        Ok(())
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            arity: ArityPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_cap() {
        let retry = RetryPolicy {
            max_attempts: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
        };

        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(400));
        assert_eq!(retry.backoff(6), Duration::from_millis(3_200));
        assert_eq!(retry.backoff(7), Duration::from_millis(5_000));
        assert_eq!(retry.backoff(60), Duration::from_millis(5_000));
    }

    #[test]
    fn test_default_config_is_valid() {
        LoadConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = LoadConfig {
            workers: 0,
            ..LoadConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_larger_than_cap_rejected() {
        let config = LoadConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 10_000,
                max_backoff_ms: 5_000,
            },
            ..LoadConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_arity_policy_round_trip() {
        for policy in [ArityPolicy::Abort, ArityPolicy::Skip, ArityPolicy::Coerce] {
            let parsed: ArityPolicy = policy.to_string().parse().unwrap();
            assert_eq!(parsed, policy);
        }
        assert!("drop".parse::<ArityPolicy>().is_err());
    }
}
