//! JSON file item store

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use harvester_domain::usecases::append_unique;
use harvester_domain::{Item, ItemStore, StoreError};
use serde::de::IgnoredAny;
use tokio::sync::Mutex;

/// Whole collection kept as one pretty-printed JSON array.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so readers never observe a half-written array.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub const FILE_NAME: &'static str = "items.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at `<dir>/items.json`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File contents, `None` when nothing has been written yet
    async fn read_raw(&self) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn corrupt(&self, error: serde_json::Error) -> StoreError {
        StoreError::Serialization(format!("{}: {}", self.path.display(), error))
    }

    async fn write_all(&self, items: &[Item]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(items)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ItemStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<Item>, StoreError> {
        match self.read_raw().await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| self.corrupt(e)),
            None => Ok(Vec::new()),
        }
    }

    async fn append(&self, items: &[Item]) -> Result<Vec<Item>, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut existing = self.load().await?;
        let added = append_unique(&mut existing, items);
        if added > 0 {
            self.write_all(&existing).await?;
        }

        tracing::debug!(
            path = %self.path.display(),
            added,
            total = existing.len(),
            "Appended to JSON store"
        );
        Ok(existing)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        match self.read_raw().await? {
            Some(raw) => serde_json::from_str::<Vec<IgnoredAny>>(&raw)
                .map(|entries| entries.len())
                .map_err(|e| self.corrupt(e)),
            None => Ok(0),
        }
    }
}
