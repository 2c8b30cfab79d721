//! Pacing between batches and refresh steps.
//!
//! The dispatcher never sleeps directly; it asks a [`Pacer`], so tests can
//! run a full harvest without real delays and assert on what was requested.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Why the dispatcher is pausing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    BatchCooldown,
    RefreshStep,
}

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, reason: Pause, duration: Duration);
}

/// Real pacer backed by `tokio::time::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, _reason: Pause, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Returns immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPacer;

#[async_trait]
impl Pacer for NoopPacer {
    async fn pause(&self, _reason: Pause, _duration: Duration) {}
}

/// Returns immediately and remembers every requested pause
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<(Pause, Duration)>>,
}

impl RecordingPacer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses requested so far, in order
    #[must_use]
    pub fn pauses(&self) -> Vec<(Pause, Duration)> {
        self.pauses
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn count(&self, reason: Pause) -> usize {
        self.pauses().iter().filter(|(r, _)| *r == reason).count()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, reason: Pause, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push((reason, duration));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_noop_pacer_returns_immediately() {
        let start = Instant::now();
        NoopPacer.pause(Pause::BatchCooldown, Duration::from_secs(100)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_recording_pacer() {
        let pacer = RecordingPacer::new();
        pacer.pause(Pause::BatchCooldown, Duration::from_secs(3)).await;
        pacer.pause(Pause::RefreshStep, Duration::from_secs(1)).await;
        pacer.pause(Pause::RefreshStep, Duration::from_secs(1)).await;

        assert_eq!(pacer.count(Pause::BatchCooldown), 1);
        assert_eq!(pacer.count(Pause::RefreshStep), 2);
        assert_eq!(pacer.pauses()[0], (Pause::BatchCooldown, Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_tokio_pacer_sleeps() {
        let start = Instant::now();
        TokioPacer.pause(Pause::RefreshStep, Duration::from_millis(30)).await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
