use crate::TrackedEvent;
use async_trait::async_trait;
use std::sync::Arc;

/// Delivers tracked events to the analytics collector.
///
/// A transport may batch events: `send` accepting an event does not mean it was delivered, only a
/// successful `flush` afterwards does. An `Err` from either means callers must not assume the
/// event was sent.
#[async_trait]
pub trait AnalyticsTransport: Send + Sync {
    async fn send(&self, event: &TrackedEvent) -> anyhow::Result<()>;

    /// Deliver everything accepted so far.
    async fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T> AnalyticsTransport for Arc<T>
where
    T: AnalyticsTransport + ?Sized,
{
    async fn send(&self, event: &TrackedEvent) -> anyhow::Result<()> {
        self.as_ref().send(event).await
    }

    async fn flush(&self) -> anyhow::Result<()> {
        self.as_ref().flush().await
    }
}
