//! Client runtime options.

use std::time::Duration;

use tracing::warn;

/// Default capacity of the handshake event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 32;

/// Runtime options for the reconnecting client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Reconnection policy.
    pub reconnect: ReconnectPolicy,

    /// Handshake events buffered before new ones are dropped.
    pub event_capacity: usize,

    /// A connection that stayed up this long resets the backoff.
    pub stable_after: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            stable_after: Duration::from_secs(60),
        }
    }
}

impl ClientOptions {
    /// Defaults with `HY2CTL_RECONNECT_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.apply_env_overrides(|key| std::env::var(key).ok());
        options
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let parse = |key: &str| {
            let raw = lookup(key)?;
            raw.parse::<u64>()
                .inspect_err(|e| warn!(key, value = %raw, error = %e, "Ignoring bad override"))
                .ok()
        };
        if let Some(ms) = parse("HY2CTL_RECONNECT_INITIAL_MS") {
            self.reconnect.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse("HY2CTL_RECONNECT_MAX_MS") {
            self.reconnect.max_delay = Duration::from_millis(ms);
        }
        if let Some(n) = parse("HY2CTL_RECONNECT_MAX_ATTEMPTS") {
            self.reconnect.max_attempts = Some(u32::try_from(n).unwrap_or(u32::MAX));
        }
    }
}

/// Exponential backoff reconnection policy.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Wait before the first reconnect.
    pub initial_delay: Duration,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
    /// Growth factor between consecutive waits.
    pub multiplier: u32,
    /// Reconnects allowed in a row (None = unlimited).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Wait before reconnect number `attempt` (0-indexed), saturating at
    /// `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(self.multiplier.saturating_pow(attempt))
            .min(self.max_delay)
    }

    pub const fn should_retry(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max,
            None => true,
        }
    }

    /// Fresh attempt tracker for one connection loop.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempt: 0,
        }
    }
}

/// Attempt counter driven by a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    /// Delay before the next reconnect, or `None` once the policy gives up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.policy.should_retry(self.attempt) {
            return None;
        }
        let delay = self.policy.delay_for_attempt(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }

    /// Reconnects handed out since the last reset.
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Start over after a connection proved stable.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn exponential_backoff_delays() {
        let policy = ReconnectPolicy::default();

        // 1s, 2s, 4s, ... 32s, then capped at 60s
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(32));
        assert_eq!(policy.delay_for_attempt(6), Duration::from_secs(60));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn backoff_gives_up_and_resets() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            multiplier: 3,
            max_attempts: Some(3),
        };
        let mut backoff = policy.backoff();

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(250)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(250)));
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempt(), 3);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn zero_attempts_never_retries() {
        let policy = ReconnectPolicy {
            max_attempts: Some(0),
            ..Default::default()
        };
        assert_eq!(policy.backoff().next_delay(), None);
    }

    #[test]
    fn retry_with_max_attempts() {
        let policy = ReconnectPolicy {
            max_attempts: Some(2),
            ..Default::default()
        };

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        assert!(ReconnectPolicy::default().should_retry(u32::MAX));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("HY2CTL_RECONNECT_INITIAL_MS", "250"),
            ("HY2CTL_RECONNECT_MAX_MS", "5000"),
            ("HY2CTL_RECONNECT_MAX_ATTEMPTS", "7"),
        ]
        .into_iter()
        .collect();

        let mut options = ClientOptions::default();
        options.apply_env_overrides(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(options.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(options.reconnect.max_delay, Duration::from_secs(5));
        assert_eq!(options.reconnect.max_attempts, Some(7));
        assert_eq!(options.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn bad_env_override_is_ignored() {
        let mut options = ClientOptions::default();
        options.apply_env_overrides(|k| {
            (k == "HY2CTL_RECONNECT_INITIAL_MS").then(|| "soon".to_string())
        });
        assert_eq!(options.reconnect.initial_delay, Duration::from_secs(1));
    }
}
