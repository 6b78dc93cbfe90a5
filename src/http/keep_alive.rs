use std::time::Duration;

/// Parameters advertised in the `Keep-Alive` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    /// How long an idle connection is kept open after a response.
    pub timeout: Duration,
    /// How many requests one connection may carry.
    pub max: u32,
}

impl KeepAlive {
    /// Renders the header value, e.g. `timeout=5, max=100`.
    pub fn header_value(&self) -> String {
        format!("timeout={}, max={}", self.timeout.as_secs(), self.max)
    }
}

/// Chooses keep-alive parameters from the current number of live
/// connections.
pub trait KeepAlivePolicy: Send + Sync + 'static {
    fn keep_alive(&self, live_connections: u64) -> KeepAlive;
}

/// Same parameters regardless of load.
#[derive(Debug, Clone, Copy)]
pub struct FixedKeepAlive(pub KeepAlive);

impl Default for FixedKeepAlive {
    fn default() -> Self {
        Self(KeepAlive {
            timeout: Duration::from_secs(5),
            max: 100,
        })
    }
}

impl KeepAlivePolicy for FixedKeepAlive {
    fn keep_alive(&self, _live_connections: u64) -> KeepAlive {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_five_seconds_hundred_requests() {
        let ka = FixedKeepAlive::default().keep_alive(10_000);
        assert_eq!(ka.timeout, Duration::from_secs(5));
        assert_eq!(ka.max, 100);
        assert_eq!(ka.header_value(), "timeout=5, max=100");
    }
}
