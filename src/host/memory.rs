use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{DocumentStore, PluginDataStore};

/// In-memory documents for tests.
#[derive(Default)]
pub(crate) struct MemoryDocuments {
    docs: Mutex<HashMap<String, String>>,
    writes: Mutex<u32>,
}

impl MemoryDocuments {
    pub(crate) fn with(path: &str, text: &str) -> Self {
        let mut docs = HashMap::new();
        docs.insert(path.to_string(), text.to_string());
        Self {
            docs: Mutex::new(docs),
            writes: Mutex::new(0),
        }
    }

    pub(crate) async fn get(&self, path: &str) -> Option<String> {
        self.docs.lock().await.get(path).cloned()
    }

    pub(crate) async fn put(&self, path: &str, text: &str) {
        self.docs
            .lock()
            .await
            .insert(path.to_string(), text.to_string());
    }

    pub(crate) async fn remove(&self, path: &str) {
        self.docs.lock().await.remove(path);
    }

    pub(crate) async fn write_count(&self) -> u32 {
        *self.writes.lock().await
    }
}

impl DocumentStore for MemoryDocuments {
    async fn resolve_path(&self, path: &str) -> Option<String> {
        self.docs
            .lock()
            .await
            .contains_key(path)
            .then(|| path.to_string())
    }

    async fn read_document(&self, path: &str) -> Result<String> {
        self.docs
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no document at {path}"))
    }

    async fn write_document(&self, path: &str, text: &str) -> Result<()> {
        self.docs
            .lock()
            .await
            .insert(path.to_string(), text.to_string());
        *self.writes.lock().await += 1;
        Ok(())
    }
}

/// In-memory plugin data slot for tests.
#[derive(Default)]
pub(crate) struct MemoryPluginData {
    data: Mutex<Option<Value>>,
}

impl MemoryPluginData {
    pub(crate) fn with(value: Value) -> Self {
        Self {
            data: Mutex::new(Some(value)),
        }
    }

    pub(crate) async fn snapshot(&self) -> Option<Value> {
        self.data.lock().await.clone()
    }
}

impl PluginDataStore for MemoryPluginData {
    async fn load_plugin_data(&self) -> Result<Option<Value>> {
        Ok(self.data.lock().await.clone())
    }

    async fn save_plugin_data(&self, data: Value) -> Result<()> {
        *self.data.lock().await = Some(data);
        Ok(())
    }
}
