//! Jittered exponential backoff between unproductive receives.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::StreamError;

/// Receive attempts a single read makes before giving up on empty frames.
pub const MAX_TRIES: u32 = 5;

/// Floor applied to every backoff delay.
pub const BACKOFF_BASE: Duration = Duration::from_millis(10);

/// Ceiling applied to every backoff delay.
pub const BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Growth factor applied to the previous delay.
pub const BACKOFF_FACTOR: f64 = 1.3;

/// Largest fraction of the grown delay removed by jitter.
pub const BACKOFF_JITTER: f64 = 0.4;

/// Delay generator for one read's sequence of empty receives.
///
/// Each delay is `previous * BACKOFF_FACTOR * (1 - BACKOFF_JITTER * r)` for a
/// sample `r` in `[0, 1)`, clamped to `[BACKOFF_BASE, BACKOFF_MAX]`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    previous: Duration,
    jitter: fn() -> f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    /// Create a backoff using a uniformly random jitter sample.
    #[must_use]
    pub fn new() -> Self {
        Self::with_jitter_source(rand::random::<f64>)
    }

    /// Create a backoff drawing jitter samples from `jitter`.
    ///
    /// Samples outside `[0, 1]` are clamped.
    #[must_use]
    pub const fn with_jitter_source(jitter: fn() -> f64) -> Self {
        Self {
            previous: Duration::ZERO,
            jitter,
        }
    }

    /// Compute the next delay and remember it as the previous one.
    pub fn next_delay(&mut self) -> Duration {
        let sample = (self.jitter)().clamp(0.0, 1.0);
        let delay = grow(self.previous, sample).clamp(BACKOFF_BASE, BACKOFF_MAX);
        self.previous = delay;
        delay
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "backoff growth and jitter are defined as floating-point factors"
)]
fn grow(previous: Duration, sample: f64) -> Duration {
    previous.mul_f64(BACKOFF_FACTOR * (1.0 - BACKOFF_JITTER * sample))
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// `attempts` is the number of empty receives already seen and is carried
/// into the cancellation error.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "false positive triggered inside tokio::select! expansion"
)]
pub(crate) async fn wait(
    delay: Duration,
    attempts: u32,
    cancel: &CancellationToken,
) -> Result<(), StreamError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StreamError::Cancelled { attempts }),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
