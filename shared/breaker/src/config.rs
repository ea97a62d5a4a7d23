use std::time::Duration;

/// Per-breaker knobs, one instance per named dependency (`email`, `sms`,
/// `mfa_provider`, `external_api`, `database`, `cache`, `kms`, ...). Mirrors
/// the configuration contract in spec.md §6.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// CLOSED -> OPEN trips when the failure rate over the sliding window
    /// reaches this percentage, once `minimum_calls` have been observed.
    pub failure_rate_threshold_percent: u8,
    /// Size of the sliding window of recent call outcomes.
    pub sliding_window_size: usize,
    /// Minimum number of calls recorded in the window before the failure
    /// rate is even considered — avoids tripping on a cold, low-volume start.
    pub minimum_calls: usize,
    /// How long the breaker stays OPEN before allowing a HALF_OPEN probe.
    pub open_duration: Duration,
    /// Consecutive successful probes required in HALF_OPEN to close again.
    pub half_open_permitted_calls: usize,
    /// Wall-clock timeout applied to every call through this breaker;
    /// timeouts count as failures.
    pub call_timeout: Duration,
}

impl BreakerConfig {
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::default()
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold_percent: 50,
            sliding_window_size: 20,
            minimum_calls: 10,
            open_duration: Duration::from_secs(30),
            half_open_permitted_calls: 3,
            call_timeout: Duration::from_secs(5),
        }
    }
}

pub struct BreakerConfigBuilder {
    inner: BreakerConfig,
}

impl BreakerConfigBuilder {
    pub fn failure_rate_threshold_percent(mut self, v: u8) -> Self {
        self.inner.failure_rate_threshold_percent = v;
        self
    }

    pub fn sliding_window_size(mut self, v: usize) -> Self {
        self.inner.sliding_window_size = v;
        self
    }

    pub fn minimum_calls(mut self, v: usize) -> Self {
        self.inner.minimum_calls = v;
        self
    }

    pub fn open_duration(mut self, v: Duration) -> Self {
        self.inner.open_duration = v;
        self
    }

    pub fn half_open_permitted_calls(mut self, v: usize) -> Self {
        self.inner.half_open_permitted_calls = v;
        self
    }

    pub fn call_timeout(mut self, v: Duration) -> Self {
        self.inner.call_timeout = v;
        self
    }

    pub fn build(self) -> BreakerConfig {
        self.inner
    }
}

impl Default for BreakerConfigBuilder {
    fn default() -> Self {
        Self {
            inner: BreakerConfig::default(),
        }
    }
}
