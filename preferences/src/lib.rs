//! Persisted preferences of the wallet.
//!
//! The only preference the analytics side cares about is [`METRICS_OPT_IN`], the consent of the
//! user to have usage metrics collected. It is set during onboarding and read before every
//! tracked event.

mod config;
mod db;
mod memory;

pub use config::*;
pub use db::SqlitePreferences;
pub use memory::MemoryPreferences;

use async_trait::async_trait;
use std::sync::Arc;

/// The key of the metrics consent flag.
pub const METRICS_OPT_IN: &str = "metrics-opt-in";

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Get a flag, `None` if it was never set.
    async fn get(&self, key: &str) -> anyhow::Result<Option<bool>>;

    /// Set a flag, replacing an existing value.
    async fn set(&self, key: &str, value: bool) -> anyhow::Result<()>;
}

#[async_trait]
impl<T> PreferenceStore for Arc<T>
where
    T: PreferenceStore + ?Sized,
{
    async fn get(&self, key: &str) -> anyhow::Result<Option<bool>> {
        self.as_ref().get(key).await
    }

    async fn set(&self, key: &str, value: bool) -> anyhow::Result<()> {
        self.as_ref().set(key, value).await
    }
}
