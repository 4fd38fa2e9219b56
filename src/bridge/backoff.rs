//! Reconnect delay with exponential growth and equal jitter.

use std::time::Duration;

use rand::Rng;

/// Floor for both delays; a zero setting would reconnect in a tight loop.
const MIN_DELAY: Duration = Duration::from_millis(10);

/// Doubles the base delay after every failed attempt, capped at `max`.
/// Each returned delay is `base/2 + random(0..=base/2)` so a fleet of gateways
/// restarting together does not hammer the broker in lockstep.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(MIN_DELAY);
        let initial = initial.clamp(MIN_DELAY, max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to sleep before the next attempt. Advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.max);

        let half = base / 2;
        let spread = u64::try_from((base - half).as_millis()).unwrap_or(u64::MAX);
        let jitter = rand::thread_rng().gen_range(0..=spread);
        half + Duration::from_millis(jitter)
    }

    /// Back to the initial delay, after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_stay_within_jitter_window() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        let expected_bases = [100u64, 200, 400, 800, 1600];
        for base in expected_bases {
            let d = backoff.next_delay().as_millis() as u64;
            assert!(d >= base / 2 && d <= base, "delay {d} outside [{}, {base}]", base / 2);
        }
    }

    #[test]
    fn delay_is_capped() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(300));
        for _ in 0..10 {
            assert!(backoff.next_delay() <= Duration::from_millis(300));
        }
    }

    #[test]
    fn reset_restarts_schedule() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        assert!(backoff.next_delay() <= Duration::from_millis(100));
    }

    #[test]
    fn zero_delay_is_raised_to_floor() {
        let mut backoff = Backoff::new(Duration::ZERO, Duration::ZERO);
        for _ in 0..5 {
            let d = backoff.next_delay();
            assert!(d >= MIN_DELAY / 2 && d <= MIN_DELAY, "delay {d:?}");
        }
    }

    #[test]
    fn initial_larger_than_max_is_clamped() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(1));
        assert!(backoff.next_delay() <= Duration::from_secs(1));
    }
}
