//! Fixed-interval throttling between sends.
//!
//! The dispatcher pauses after every attempt. How long depends only on the
//! outcome and the content kind ([`DelayPolicy`]); how the pause happens is
//! behind [`Pacer`] so tests can record pauses instead of sleeping.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::DispatchConfig;
use crate::media::ContentKind;

/// Suspends the send loop between attempts.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait for `delay` without blocking other tasks.
    async fn pause(&self, delay: Duration);
}

/// [`Pacer`] backed by the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Pause lengths after each send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    /// After a successful non-video send.
    pub success: Duration,
    /// After a successful video send.
    pub video_success: Duration,
    /// After any failed send.
    pub failure: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            success: Duration::from_millis(3000),
            video_success: Duration::from_millis(5000),
            failure: Duration::from_millis(5000),
        }
    }
}

impl DelayPolicy {
    /// Policy from the `[dispatch]` config section.
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            success: Duration::from_millis(config.success_delay_ms),
            video_success: Duration::from_millis(config.video_success_delay_ms),
            failure: Duration::from_millis(config.failure_delay_ms),
        }
    }

    /// Pause after a successful send of `kind`.
    pub fn after_success(&self, kind: ContentKind) -> Duration {
        match kind {
            ContentKind::Video => self.video_success,
            ContentKind::Text | ContentKind::Image | ContentKind::Audio => self.success,
        }
    }

    /// Pause after a failed send, whatever the kind.
    pub fn after_failure(&self, _kind: ContentKind) -> Duration {
        self.failure
    }
}
