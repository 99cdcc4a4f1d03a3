//! Waiting between polls.

use std::time::Duration;

use async_trait::async_trait;

/// Suspends the enrollment between polls for a signed certificate.
#[async_trait]
pub trait Waiter: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Real-time waiter backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioWaiter;

#[async_trait]
impl Waiter for TokioWaiter {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
