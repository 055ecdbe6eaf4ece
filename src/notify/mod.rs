// Outbound notifications
pub mod messages;
pub mod telegram;

pub use telegram::TelegramNotifier;

use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// How often a message is attempted before it is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Best-effort message sink, shared by all scan workers
#[async_trait]
pub trait Notifier: Send + Sync {
    /// One delivery attempt
    async fn try_send(&self, text: &str) -> Result<()>;

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Deliver with retries; never fails the caller
    ///
    /// Returns whether the message went out.
    async fn send(&self, text: &str) -> bool {
        let policy = self.retry_policy();

        for attempt in 1..=policy.max_attempts {
            match self.try_send(text).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!(
                        "Notification send failed (attempt {}/{}): {}",
                        attempt,
                        policy.max_attempts,
                        e
                    );
                    if attempt < policy.max_attempts {
                        tokio::time::sleep(policy.backoff).await;
                    }
                }
            }
        }

        tracing::error!(
            "Dropping notification after {} attempts",
            policy.max_attempts
        );
        false
    }
}

/// Writes notifications to the log instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn try_send(&self, text: &str) -> Result<()> {
        tracing::info!(target: "pairscan::notify", "{}", text);
        Ok(())
    }
}
