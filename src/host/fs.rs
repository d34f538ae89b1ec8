use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::warn;

use super::DocumentStore;

/// Documents stored as files under a vault directory. Paths are vault-relative
/// with `/` separators, the way the host addresses them.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if path.is_empty() || escapes {
            bail!("document path '{path}' is not inside the vault");
        }
        Ok(self.root.join(relative))
    }
}

impl DocumentStore for FsDocumentStore {
    async fn resolve_path(&self, path: &str) -> Option<String> {
        let full = match self.full_path(path) {
            Ok(full) => full,
            Err(err) => {
                warn!("{err}");
                return None;
            }
        };

        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Some(path.to_string()),
            _ => None,
        }
    }

    async fn read_document(&self, path: &str) -> Result<String> {
        let full = self.full_path(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .with_context(|| format!("failed to read document {}", full.display()))
    }

    async fn write_document(&self, path: &str, text: &str) -> Result<()> {
        let full = self.full_path(path)?;
        tokio::fs::write(&full, text)
            .await
            .with_context(|| format!("failed to write document {}", full.display()))
    }
}
