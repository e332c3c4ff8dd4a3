//! Ordering helpers for asynchronous renders and bursty input.

use chrono::{DateTime, Duration, Utc};

/// Identifies one issued render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderToken(u64);

impl RenderToken {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Monotonic source of [`RenderToken`]s. Only the latest token is current, so
/// responses to superseded requests can be recognized and dropped.
#[derive(Debug, Default)]
pub struct RequestCounter {
    latest: u64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new token, superseding every earlier one.
    pub fn issue(&mut self) -> RenderToken {
        self.latest += 1;
        RenderToken(self.latest)
    }

    pub fn is_current(&self, token: RenderToken) -> bool {
        token.0 == self.latest
    }

    /// Makes every issued token stale without issuing a new one.
    pub fn invalidate(&mut self) {
        self.latest += 1;
    }
}

/// Holds the last pushed value until it has been left alone for `delay`.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, DateTime<Utc>)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replaces any pending value and restarts the delay.
    pub fn push(&mut self, value: T, now: DateTime<Utc>) {
        self.pending = Some((value, now));
    }

    /// Takes the pending value once it has settled.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<T> {
        match &self.pending {
            Some((_, pushed_at)) if now - *pushed_at >= self.delay => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    /// Value still waiting to settle, if any.
    pub fn peek(&self) -> Option<&T> {
        self.pending.as_ref().map(|(value, _)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::milliseconds(millis)
    }

    #[test]
    fn only_latest_token_is_current() {
        let mut counter = RequestCounter::new();
        let first = counter.issue();
        assert!(counter.is_current(first));
        let second = counter.issue();
        assert!(!counter.is_current(first));
        assert!(counter.is_current(second));
        assert!(second.id() > first.id());

        counter.invalidate();
        assert!(!counter.is_current(second));
    }

    #[test]
    fn debouncer_releases_after_quiet_period() {
        let mut debouncer = Debouncer::new(Duration::milliseconds(200));
        debouncer.push("#111111", at(0));
        assert_eq!(debouncer.poll(at(150)), None);

        debouncer.push("#222222", at(150));
        assert_eq!(debouncer.poll(at(300)), None);
        assert_eq!(debouncer.peek(), Some(&"#222222"));
        assert_eq!(debouncer.poll(at(350)), Some("#222222"));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(at(1000)), None);
    }

    #[test]
    fn cleared_debouncer_emits_nothing() {
        let mut debouncer = Debouncer::new(Duration::milliseconds(200));
        debouncer.push(1, at(0));
        debouncer.clear();
        assert_eq!(debouncer.poll(at(500)), None);
    }
}
