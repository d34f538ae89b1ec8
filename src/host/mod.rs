//! Seams to the hosting application.
//!
//! The host owns the documents the tasks live in and a key/value slot for the
//! plugin's own data. Both are reached through these traits so the timer core
//! never depends on a particular editor or storage backend.

use std::future::Future;

use anyhow::Result;
use serde_json::Value;

mod fs;

#[cfg(test)]
pub(crate) mod memory;

pub use fs::FsDocumentStore;

/// Markdown documents addressed by host path.
pub trait DocumentStore: Send + Sync + 'static {
    /// Resolves a path to a live document, `None` if it was deleted or renamed.
    fn resolve_path(&self, path: &str) -> impl Future<Output = Option<String>> + Send;

    fn read_document(&self, path: &str) -> impl Future<Output = Result<String>> + Send;

    /// Whole-document overwrite.
    fn write_document(&self, path: &str, text: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Single JSON blob holding settings, stats and the timer session.
pub trait PluginDataStore: Send + Sync + 'static {
    fn load_plugin_data(&self) -> impl Future<Output = Result<Option<Value>>> + Send;

    fn save_plugin_data(&self, data: Value) -> impl Future<Output = Result<()>> + Send;
}
