use super::{DeferredEvent, DeferredEventStore};
use async_trait::async_trait;
use tokio::sync::Mutex;
use walletmetrics_analytics::TrackedEvent;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    events: Vec<DeferredEvent>,
}

#[derive(Debug, Default)]
pub struct MemoryDeferredStore {
    inner: Mutex<Inner>,
}

impl MemoryDeferredStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeferredEventStore for MemoryDeferredStore {
    async fn enqueue(&self, event: TrackedEvent) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.events.push(DeferredEvent { id, event });
        Ok(())
    }

    async fn pending(&self) -> anyhow::Result<Vec<DeferredEvent>> {
        Ok(self.inner.lock().await.events.clone())
    }

    async fn acknowledge(&self, id: i64) -> anyhow::Result<()> {
        self.inner.lock().await.events.retain(|deferred| deferred.id != id);
        Ok(())
    }

    async fn len(&self) -> anyhow::Result<usize> {
        Ok(self.inner.lock().await.events.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn acknowledge_removes() -> Result<(), anyhow::Error> {
        let store = MemoryDeferredStore::new();
        assert!(store.is_empty().await?);

        store.enqueue(TrackedEvent::new("a")).await?;
        store.enqueue(TrackedEvent::new("b")).await?;
        assert_eq!(store.len().await?, 2);

        let pending = store.pending().await?;
        assert_eq!(pending.len(), 2);
        assert!(pending[0].id < pending[1].id);

        store.acknowledge(pending[0].id).await?;
        assert_eq!(store.list().await?, vec![TrackedEvent::new("b")]);

        // acknowledging twice is harmless
        store.acknowledge(pending[0].id).await?;
        store.acknowledge(pending[1].id).await?;
        assert!(store.is_empty().await?);

        Ok(())
    }
}
