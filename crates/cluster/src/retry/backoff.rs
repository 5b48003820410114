use std::time::Duration;

use rand::Rng;

/// A sequence of waits indexed by the 1-based retry number. `None` means
/// the sequence is exhausted and the caller should give up.
pub trait Backoff: Send + Sync + 'static {
    fn next(&self, retry: u32) -> Option<Duration>;
}

/// Retry at once, forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroBackoff;

impl Backoff for ZeroBackoff {
    #[inline]
    fn next(&self, _retry: u32) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

/// Never retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopBackoff;

impl Backoff for StopBackoff {
    #[inline]
    fn next(&self, _retry: u32) -> Option<Duration> {
        None
    }
}

/// Same wait every time, forever.
#[derive(Debug, Clone, Copy)]
pub struct ConstantBackoff {
    interval: Duration,
}

impl ConstantBackoff {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Backoff for ConstantBackoff {
    #[inline]
    fn next(&self, _retry: u32) -> Option<Duration> {
        Some(self.interval)
    }
}

/// Explicit list of waits in milliseconds, one per retry. With jitter each
/// wait is moved randomly by up to a third of its length.
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use cluster::retry::{Backoff, SimpleBackoff};
///
/// let backoff = SimpleBackoff::new(&[100, 100, 100]);
/// assert_eq!(backoff.next(1), Some(Duration::from_millis(100)));
/// assert_eq!(backoff.next(3), Some(Duration::from_millis(100)));
/// assert_eq!(backoff.next(4), None);
/// ```
#[derive(Debug, Clone)]
pub struct SimpleBackoff {
    ticks: Vec<u64>,
    jitter: bool,
}

impl SimpleBackoff {
    pub fn new(ticks: &[u64]) -> Self {
        Self {
            ticks: ticks.to_vec(),
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

impl Backoff for SimpleBackoff {
    fn next(&self, retry: u32) -> Option<Duration> {
        if retry == 0 {
            return None;
        }
        let millis = *self.ticks.get(retry as usize - 1)?;
        let millis = if self.jitter { _jitter(millis) } else { millis };
        Some(Duration::from_millis(millis))
    }
}

fn _jitter(millis: u64) -> u64 {
    let spread = millis / 3;
    if spread == 0 {
        return millis;
    }
    millis - spread + rand::rng().random_range(0..=spread * 2)
}

/// Waits `initial * r * 2^(retry-1)` with a random `r` in `[1, 2)` and
/// stops once that reaches `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }
}

impl Backoff for ExponentialBackoff {
    fn next(&self, retry: u32) -> Option<Duration> {
        if retry == 0 {
            return None;
        }
        let factor = 1.0 + rand::rng().random::<f64>();
        let exp = 2f64.powi(retry.saturating_sub(1).min(62) as i32);
        let wait = self.initial.as_secs_f64() * factor * exp;
        if wait >= self.max.as_secs_f64() {
            return None;
        }
        Some(Duration::from_secs_f64(wait))
    }
}
