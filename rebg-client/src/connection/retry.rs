//! Reconnection policy
//!
//! Decides whether, and after how long, the transport is reopened after an
//! unexpected closure. Explicit closes never consult the policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconnect policy, as written in the `[retry]` config table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum RetryPolicy {
    /// Never reconnect automatically
    #[default]
    None,
    /// Reconnect after a constant delay
    FixedDelay {
        delay_ms: u64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
    /// Reconnect after `base_ms * 2^attempt`, capped at `max_ms`
    ExponentialBackoff {
        base_ms: u64,
        max_ms: u64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
}

impl RetryPolicy {
    /// Fixed delay without an attempt limit
    pub fn fixed(delay: Duration) -> Self {
        Self::FixedDelay {
            delay_ms: delay.as_millis() as u64,
            max_attempts: None,
        }
    }

    /// Exponential backoff without an attempt limit
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self::ExponentialBackoff {
            base_ms: base.as_millis() as u64,
            max_ms: max.as_millis() as u64,
            max_attempts: None,
        }
    }

    /// Bound the number of consecutive attempts. No effect on `None`.
    pub fn with_max_attempts(self, limit: u32) -> Self {
        match self {
            Self::None => Self::None,
            Self::FixedDelay { delay_ms, .. } => Self::FixedDelay {
                delay_ms,
                max_attempts: Some(limit),
            },
            Self::ExponentialBackoff { base_ms, max_ms, .. } => Self::ExponentialBackoff {
                base_ms,
                max_ms,
                max_attempts: Some(limit),
            },
        }
    }

    /// Check the policy parameters
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::None => Ok(()),
            Self::FixedDelay { delay_ms, .. } if *delay_ms == 0 => {
                Err("retry delay_ms must be greater than 0".into())
            }
            Self::ExponentialBackoff { base_ms, .. } if *base_ms == 0 => {
                Err("retry base_ms must be greater than 0".into())
            }
            Self::ExponentialBackoff { base_ms, max_ms, .. } if base_ms > max_ms => {
                Err(format!("retry base_ms ({}) exceeds max_ms ({})", base_ms, max_ms))
            }
            _ => Ok(()),
        }
    }

    fn max_attempts(&self) -> Option<u32> {
        match self {
            Self::None => Some(0),
            Self::FixedDelay { max_attempts, .. }
            | Self::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }
}

/// Attempt counter driven by a `RetryPolicy`
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay before the next attempt, or `None` once the policy gives up
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(limit) = self.policy.max_attempts() {
            if self.attempt >= limit {
                return None;
            }
        }

        let delay_ms = match &self.policy {
            RetryPolicy::None => return None,
            RetryPolicy::FixedDelay { delay_ms, .. } => *delay_ms,
            RetryPolicy::ExponentialBackoff { base_ms, max_ms, .. } => base_ms
                .saturating_mul(2u64.saturating_pow(self.attempt))
                .min(*max_ms),
        };

        self.attempt += 1;
        Some(Duration::from_millis(delay_ms))
    }

    /// Forget previous failures, after a successful handshake
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts scheduled since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
