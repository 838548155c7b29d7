use crate::PreferenceStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Preferences which only live as long as the process.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RwLock<HashMap<String, bool>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferences {
    async fn get(&self, key: &str) -> anyhow::Result<Option<bool>> {
        Ok(self.values.read().await.get(key).copied())
    }

    async fn set(&self, key: &str, value: bool) -> anyhow::Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
