//! Token-bucket limiter guarding outbound OCR calls (spec.md §4.3). Kept in
//! its own crate, as in the teacher, so both the ingestion pipeline and any
//! future outbound-call site can share the same limiter type without
//! depending on `ingestion` directly.

use {
    std::{num::NonZeroU32, time::Duration},
    tokio::sync::Mutex,
};

#[derive(Debug, thiserror::Error)]
#[error("rate limit exceeded, retry after {retry_after:?}")]
pub struct RateLimitError {
    pub retry_after: Duration,
}

struct State {
    tokens: u32,
    last_refill: tokio::time::Instant,
}

/// A single-bucket token-bucket limiter: `capacity` tokens refill linearly
/// over `period`. `try_acquire` never blocks; callers that want to wait
/// instead of failing should retry after `retry_after`.
pub struct Limiter {
    capacity: NonZeroU32,
    period: Duration,
    state: Mutex<State>,
}

impl Limiter {
    pub fn new(capacity: NonZeroU32, period: Duration) -> Self {
        Self {
            capacity,
            period,
            state: Mutex::new(State {
                tokens: capacity.get(),
                last_refill: tokio::time::Instant::now(),
            }),
        }
    }

    /// Rate appropriate for "N calls per minute" config knobs.
    pub fn per_minute(calls: NonZeroU32) -> Self {
        Self::new(calls, Duration::from_secs(60))
    }

    fn refill_rate(&self) -> f64 {
        self.capacity.get() as f64 / self.period.as_secs_f64()
    }

    pub async fn try_acquire(&self) -> Result<(), RateLimitError> {
        let mut state = self.state.lock().await;
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let refilled = (elapsed * self.refill_rate()).floor() as u32;
        if refilled > 0 {
            state.tokens = state.tokens.saturating_add(refilled).min(self.capacity.get());
            state.last_refill = now;
        }

        if state.tokens == 0 {
            let seconds_per_token = 1.0 / self.refill_rate();
            tracing::debug!("OCR rate limit exhausted");
            return Err(RateLimitError {
                retry_after: Duration::from_secs_f64(seconds_per_token),
            });
        }

        state.tokens -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn exhausts_and_refills() {
        let limiter = Limiter::new(NonZeroU32::new(2).unwrap(), Duration::from_secs(1));
        limiter.try_acquire().await.unwrap();
        limiter.try_acquire().await.unwrap();
        assert!(limiter.try_acquire().await.is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire().await.is_ok());
    }
}
