//! Holding area for events tracked before the user consented to metrics.

mod memory;
mod sqlite;

pub use memory::MemoryDeferredStore;
pub use sqlite::SqliteDeferredStore;

use async_trait::async_trait;
use std::sync::Arc;
use walletmetrics_analytics::TrackedEvent;

/// An event waiting in the store, `id` identifies it for [`DeferredEventStore::acknowledge`].
#[derive(Clone, Debug, PartialEq)]
pub struct DeferredEvent {
    pub id: i64,
    pub event: TrackedEvent,
}

#[async_trait]
pub trait DeferredEventStore: Send + Sync {
    /// Append an event.
    async fn enqueue(&self, event: TrackedEvent) -> anyhow::Result<()>;

    /// All events, oldest first, without removing them.
    async fn pending(&self) -> anyhow::Result<Vec<DeferredEvent>>;

    /// Remove an event once it was delivered. Unknown ids are ignored.
    async fn acknowledge(&self, id: i64) -> anyhow::Result<()>;

    async fn len(&self) -> anyhow::Result<usize>;

    async fn list(&self) -> anyhow::Result<Vec<TrackedEvent>> {
        Ok(self.pending().await?.into_iter().map(|deferred| deferred.event).collect())
    }

    async fn is_empty(&self) -> anyhow::Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[async_trait]
impl<T> DeferredEventStore for Arc<T>
where
    T: DeferredEventStore + ?Sized,
{
    async fn enqueue(&self, event: TrackedEvent) -> anyhow::Result<()> {
        self.as_ref().enqueue(event).await
    }

    async fn pending(&self) -> anyhow::Result<Vec<DeferredEvent>> {
        self.as_ref().pending().await
    }

    async fn acknowledge(&self, id: i64) -> anyhow::Result<()> {
        self.as_ref().acknowledge(id).await
    }

    async fn len(&self) -> anyhow::Result<usize> {
        self.as_ref().len().await
    }
}
