//! Delay policy for the fixed waits of a probing run.
//!
//! Stage and contact settling use fixed delays rather than status polling.
//! The orchestrator and the stage driver take a [`Delay`] so production uses
//! real `tokio` sleeps while tests skip or tally them.

use crate::config::TimingConfig;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A fixed wait.
#[async_trait]
pub trait Delay: Send + Sync {
    /// Wait for `duration`.
    async fn wait(&self, duration: Duration);
}

/// Real sleep on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Delay for NoDelay {
    async fn wait(&self, _duration: Duration) {}
}

/// Returns immediately but accumulates the requested time.
#[derive(Debug, Clone, Default)]
pub struct TrackingDelay {
    total_micros: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl TrackingDelay {
    /// Tracker with nothing recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of every requested wait.
    pub fn total(&self) -> Duration {
        Duration::from_micros(self.total_micros.load(Ordering::SeqCst))
    }

    /// Number of waits requested, including zero-length ones.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Delay for TrackingDelay {
    async fn wait(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.total_micros.fetch_add(micros, Ordering::SeqCst);
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Resolved run waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// After each stage translate
    pub settle_after_move: Duration,
    /// After touchdown, and in its place on dry runs
    pub contact_settle: Duration,
    /// Between forcing a current and sampling
    pub sample_settle: Duration,
    /// After each separate
    pub post_separation: Duration,
}

impl Timing {
    /// All waits zero.
    pub const fn immediate() -> Self {
        Self {
            settle_after_move: Duration::ZERO,
            contact_settle: Duration::ZERO,
            sample_settle: Duration::ZERO,
            post_separation: Duration::ZERO,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for Timing {
    fn from(config: &TimingConfig) -> Self {
        Self {
            settle_after_move: Duration::from_millis(config.settle_after_move_ms),
            contact_settle: Duration::from_millis(config.contact_settle_ms),
            sample_settle: Duration::from_millis(config.sample_settle_ms),
            post_separation: Duration::from_millis(config.post_separation_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracking_delay_accumulates() {
        let delay = TrackingDelay::new();
        let shared = delay.clone();
        delay.wait(Duration::from_millis(2500)).await;
        shared.wait(Duration::from_millis(500)).await;
        shared.wait(Duration::ZERO).await;
        assert_eq!(delay.total(), Duration::from_millis(3000));
        assert_eq!(delay.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_delay_sleeps() {
        let start = tokio::time::Instant::now();
        TokioDelay.wait(Duration::from_millis(200)).await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_default_timing() {
        let timing = Timing::default();
        assert_eq!(timing.settle_after_move, Duration::from_millis(2500));
        assert_eq!(timing.contact_settle, Duration::from_millis(500));
        assert_eq!(timing.sample_settle, Duration::from_millis(200));
        assert_eq!(timing.post_separation, Duration::ZERO);
    }
}
