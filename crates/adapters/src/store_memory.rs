//! In-memory item store for testing and ephemeral runs

use std::sync::RwLock;

use async_trait::async_trait;
use harvester_domain::usecases::append_unique;
use harvester_domain::{Item, ItemStore, StoreError};

#[derive(Default)]
pub struct MemoryItemStore {
    items: RwLock<Vec<Item>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing collection
    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn load(&self) -> Result<Vec<Item>, StoreError> {
        let items = self
            .items
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(items.clone())
    }

    async fn append(&self, new: &[Item]) -> Result<Vec<Item>, StoreError> {
        let mut items = self
            .items
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        append_unique(&mut items, new);
        Ok(items.clone())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let items = self
            .items
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_domain::{ItemDraft, ItemKind};
    use time::OffsetDateTime;

    fn item(title: &str, link: &str) -> Item {
        ItemDraft::new(ItemKind::News, title, link).into_item("test", 1, OffsetDateTime::now_utc())
    }

    #[tokio::test]
    async fn test_append_and_count() {
        let store = MemoryItemStore::new();

        store.append(&[item("A", "https://a.example")]).await.unwrap();
        let all = store
            .append(&[item("A", "https://a.example"), item("B", "https://b.example")])
            .await
            .unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_seeded_items_are_loaded() {
        let store = MemoryItemStore::with_items(vec![item("Seed", "https://seed.example")]);

        assert_eq!(store.load().await.unwrap()[0].title, "Seed");
    }
}
