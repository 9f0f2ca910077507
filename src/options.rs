use std::time::Duration;

/// Order in which candidate replicas are tried.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OrderingPolicy {
    /// Keep the caller-supplied order, e.g. when replicas are already ranked
    /// by leadership or proximity.
    #[default]
    Stable,
    /// Uniformly random permutation to spread load.
    Random,
}

impl std::str::FromStr for OrderingPolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "random" => Ok(Self::Random),
            other => Err(format!("unknown ordering policy '{other}'")),
        }
    }
}

/// Configures candidate ordering and the fan-out timers of one send.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SendOptions {
    pub ordering: OrderingPolicy,
    /// How long to wait for outstanding attempts before launching the next
    /// candidate. Zero launches every candidate at once.
    pub send_next_timeout: Duration,
    /// Overall deadline for the whole send. Zero means unbounded.
    pub timeout: Duration,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            ordering: OrderingPolicy::Stable,
            send_next_timeout: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }
}

impl SendOptions {
    pub fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_send_next_timeout(mut self, send_next_timeout: Duration) -> Self {
        self.send_next_timeout = send_next_timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overall deadline, `None` when unbounded.
    pub fn deadline(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }

    /// Time limits handed to every attempt.
    ///
    /// The readiness wait is bounded by the smallest nonzero value among
    /// `send_next_timeout` and half of `timeout`, so a replica that never
    /// becomes healthy fails before the overall deadline. The whole attempt is
    /// bounded by `timeout`.
    pub fn attempt_budget(&self) -> AttemptBudget {
        let ready = [self.send_next_timeout, self.timeout / 2]
            .into_iter()
            .filter(|limit| !limit.is_zero())
            .min();
        AttemptBudget {
            ready,
            total: self.deadline(),
        }
    }

    /// Reads options from the environment, falling back to defaults for
    /// variables that are not set.
    ///
    /// Reads:
    /// - `KVDISPATCH_ORDERING`: `stable` or `random`
    /// - `KVDISPATCH_SEND_NEXT_TIMEOUT_MS`
    /// - `KVDISPATCH_TIMEOUT_MS`: `0` disables the overall deadline
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> std::result::Result<Self, String> {
        let mut options = Self::default();
        if let Ok(ordering) = std::env::var("KVDISPATCH_ORDERING") {
            options.ordering = ordering.parse()?;
        }
        if let Some(ms) = read_millis("KVDISPATCH_SEND_NEXT_TIMEOUT_MS")? {
            options.send_next_timeout = ms;
        }
        if let Some(ms) = read_millis("KVDISPATCH_TIMEOUT_MS")? {
            options.timeout = ms;
        }
        Ok(options)
    }
}

fn read_millis(name: &str) -> std::result::Result<Option<Duration>, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|err| format!("{name} must be a millisecond count: {err}")),
        Err(_) => Ok(None),
    }
}

/// Time limits of a single attempt. `None` means unbounded.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AttemptBudget {
    /// Limit on waiting for the connection to become ready.
    pub ready: Option<Duration>,
    /// Limit on the whole attempt, readiness wait included.
    pub total: Option<Duration>,
}

/// Configures the HTTP connections handed out by [`crate::ConnectionPool`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionOptions {
    /// Delay between health checks while a connection is not ready.
    pub health_retry_interval: Duration,
    /// Timeout applied to each individual HTTP request.
    pub request_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            health_retry_interval: Duration::from_millis(50),
            request_timeout: Duration::from_secs(30),
        }
    }
}
