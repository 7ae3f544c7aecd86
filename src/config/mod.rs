//! Configuration for the completion controller, with sensible defaults and
//! presets for common use cases.

use crate::error::{Result, WaitpointError};
use crate::router::AckPolicy;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Time-based waits shorter than this stay in process on a lightweight
/// timer; waits at or above it are persisted and durably suspended.
pub const INLINE_WAIT_THRESHOLD: Duration = Duration::from_secs(65);

/// Configuration for the active poller
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between status fetches
    pub interval: Duration,
    /// Maximum number of status fetches
    pub max_attempts: u32,
    /// Optional wall-clock budget for the whole poll. Both caps are enforced
    /// when set; the poller exceeds neither.
    pub max_wait: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl PollConfig {
    /// Default configuration: 5-second interval, 120 attempts (~10 minutes)
    pub const DEFAULT: Self = Self {
        interval: Duration::from_secs(5),
        max_attempts: 120,
        max_wait: None,
    };

    /// For jobs that take a long time: a slower cadence with the same
    /// overall horizon order of magnitude
    pub const LONG_RUNNING: Self = Self {
        interval: Duration::from_secs(30),
        max_attempts: 240,
        max_wait: Some(Duration::from_secs(7200)),
    };

    /// For jobs expected to finish quickly
    pub const TIGHT: Self = Self {
        interval: Duration::from_secs(1),
        max_attempts: 30,
        max_wait: Some(Duration::from_secs(30)),
    };

    /// Create a configuration with validation
    pub fn new(interval: Duration, max_attempts: u32, max_wait: Option<Duration>) -> Result<Self> {
        if interval.is_zero() {
            return Err(WaitpointError::InvalidConfiguration(
                "poll interval must be positive".to_string(),
            ));
        }
        if max_attempts == 0 {
            return Err(WaitpointError::InvalidConfiguration(
                "max_attempts must be positive".to_string(),
            ));
        }
        if let Some(max_wait) = max_wait {
            if max_wait < interval {
                return Err(WaitpointError::InvalidConfiguration(
                    "max_wait must be at least one poll interval".to_string(),
                ));
            }
        }
        Ok(Self {
            interval,
            max_attempts,
            max_wait,
        })
    }
}

/// Hard deadline for a signal or timer wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineSpec {
    /// Deadline after a fixed interval from suspension
    After(Duration),
    /// Deadline at a specific wall-clock instant
    At(DateTime<Utc>),
}

impl DeadlineSpec {
    /// Resolve to a wall-clock instant relative to `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DeadlineSpec::After(duration) => ChronoDuration::from_std(*duration)
                .ok()
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            DeadlineSpec::At(at) => *at,
        }
    }
}

/// Per-wait options passed alongside the wait mode
#[derive(Debug, Clone, Default)]
pub struct WaitConfig {
    /// Poller settings, used in POLL mode
    pub poll: PollConfig,
    /// Optional hard deadline for signal waits. Absent means the wait is
    /// legitimately indefinite; when present, the deadline wins over the
    /// wait and resumes with a timeout outcome.
    pub deadline: Option<DeadlineSpec>,
    /// How the router acknowledges the matched inbound call
    pub ack: AckPolicy,
    /// Extra path segment appended to generated resume URLs, so several
    /// waits in one workflow get distinct addresses
    pub callback_suffix: Option<String>,
}

impl WaitConfig {
    /// Set the poller configuration
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Set a hard deadline
    pub fn with_deadline(mut self, deadline: DeadlineSpec) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the acknowledgment policy
    pub fn with_ack(mut self, ack: AckPolicy) -> Self {
        self.ack = ack;
        self
    }

    /// Set the callback URL suffix
    pub fn with_callback_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.callback_suffix = Some(suffix.into());
        self
    }
}

/// Controller-wide settings supplied by the hosting environment
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Base address at which the host receives inbound resume calls;
    /// generated resume URLs are `<base>/<token>`. Supplied by the
    /// environment, never hard-coded.
    pub callback_base_url: String,
    /// Threshold below which time-based waits stay in process
    pub inline_wait_threshold: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            callback_base_url: String::new(),
            inline_wait_threshold: INLINE_WAIT_THRESHOLD,
        }
    }
}

impl ControllerConfig {
    /// Create a configuration with the environment-supplied callback base
    pub fn new(callback_base_url: impl Into<String>) -> Self {
        Self {
            callback_base_url: callback_base_url.into(),
            ..Self::default()
        }
    }

    /// Override the inline wait threshold
    pub fn with_inline_wait_threshold(mut self, threshold: Duration) -> Self {
        self.inline_wait_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_config_default() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.max_attempts, 120);
        assert_eq!(config.max_wait, None);
    }

    #[test]
    fn test_poll_config_validation() {
        assert!(PollConfig::new(Duration::ZERO, 10, None).is_err());
        assert!(PollConfig::new(Duration::from_secs(5), 0, None).is_err());
        assert!(
            PollConfig::new(Duration::from_secs(5), 10, Some(Duration::from_secs(1))).is_err()
        );
        assert!(PollConfig::new(Duration::from_secs(5), 10, Some(Duration::from_secs(60))).is_ok());
    }

    #[test]
    fn test_deadline_resolve() {
        let now = Utc::now();
        let resolved = DeadlineSpec::After(Duration::from_secs(10)).resolve(now);
        assert_eq!(resolved, now + ChronoDuration::seconds(10));

        let at = now + ChronoDuration::hours(2);
        assert_eq!(DeadlineSpec::At(at).resolve(now), at);
    }

    #[test]
    fn test_inline_wait_threshold() {
        assert_eq!(INLINE_WAIT_THRESHOLD, Duration::from_secs(65));
        let config = ControllerConfig::new("https://host/resume");
        assert_eq!(config.inline_wait_threshold, INLINE_WAIT_THRESHOLD);
        assert_eq!(config.callback_base_url, "https://host/resume");
    }

    #[test]
    fn test_wait_config_builders() {
        let config = WaitConfig::default()
            .with_poll(PollConfig::TIGHT)
            .with_deadline(DeadlineSpec::After(Duration::from_secs(10)))
            .with_callback_suffix("step-2");
        assert_eq!(config.poll.interval, Duration::from_secs(1));
        assert!(config.deadline.is_some());
        assert_eq!(config.callback_suffix.as_deref(), Some("step-2"));
    }
}
