use std::time::{Duration, Instant};

/// Lets a message through at most once per interval.
#[derive(Clone, Debug)]
pub struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True if a message may be emitted at `now`; records the emission.
    pub fn should_emit(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for LogThrottle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppresses_within_interval() {
        let mut throttle = LogThrottle::new(Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(throttle.should_emit(t0));
        assert!(!throttle.should_emit(t0 + Duration::from_secs(3)));
        assert!(!throttle.should_emit(t0 + Duration::from_millis(9_999)));
        assert!(throttle.should_emit(t0 + Duration::from_secs(10)));
        assert!(!throttle.should_emit(t0 + Duration::from_secs(15)));
    }

    #[test]
    fn zero_interval_never_suppresses() {
        let mut throttle = LogThrottle::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(throttle.should_emit(t0));
        assert!(throttle.should_emit(t0));
    }
}
