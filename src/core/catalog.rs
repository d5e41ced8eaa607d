use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

use crate::core::error::CatalogError;
use crate::core::recalc::RecalcMode;

/// A stored video as the bulk job sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub duration: Option<u64>,
}

impl CatalogItem {
    pub fn has_duration(&self) -> bool {
        matches!(self.duration, Some(secs) if secs > 0)
    }

    fn selected_by(&self, mode: RecalcMode) -> bool {
        match mode {
            RecalcMode::Force => true,
            RecalcMode::NullsOnly => !self.has_duration(),
        }
    }
}

/// Where the bulk job reads items from and writes durations back to.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Items in stable id order.
    async fn list(&self, mode: RecalcMode) -> Result<Vec<CatalogItem>, CatalogError>;

    async fn update_duration(&self, id: i64, seconds: u64) -> Result<(), CatalogError>;
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: RwLock<Vec<CatalogItem>>,
    rejected: RwLock<HashSet<i64>>,
}

impl MemoryCatalog {
    pub fn new(mut items: Vec<CatalogItem>) -> Self {
        items.sort_by_key(|item| item.id);
        Self {
            items: RwLock::new(items),
            rejected: RwLock::new(HashSet::new()),
        }
    }

    /// Make every write to `id` fail.
    pub async fn reject_writes(&self, id: i64) {
        self.rejected.write().await.insert(id);
    }

    pub async fn get(&self, id: i64) -> Option<CatalogItem> {
        self.items
            .read()
            .await
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    pub async fn items(&self) -> Vec<CatalogItem> {
        self.items.read().await.clone()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn list(&self, mode: RecalcMode) -> Result<Vec<CatalogItem>, CatalogError> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|item| item.selected_by(mode))
            .cloned()
            .collect())
    }

    async fn update_duration(&self, id: i64, seconds: u64) -> Result<(), CatalogError> {
        if self.rejected.read().await.contains(&id) {
            return Err(CatalogError::Rejected {
                id,
                message: "writes disabled for item".to_string(),
            });
        }

        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(CatalogError::UnknownItem(id))?;
        item.duration = Some(seconds);
        Ok(())
    }
}

/// A catalog kept as a JSON array of items on disk.
#[derive(Debug)]
pub struct JsonCatalog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_items(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| CatalogError::Io {
                source,
                path: self.path.clone(),
            })?;
        let mut items: Vec<CatalogItem> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                source,
                path: self.path.clone(),
            })?;
        items.sort_by_key(|item| item.id);
        Ok(items)
    }
}

#[async_trait]
impl CatalogStore for JsonCatalog {
    async fn list(&self, mode: RecalcMode) -> Result<Vec<CatalogItem>, CatalogError> {
        let items = self.read_items().await?;
        Ok(items
            .into_iter()
            .filter(|item| item.selected_by(mode))
            .collect())
    }

    async fn update_duration(&self, id: i64, seconds: u64) -> Result<(), CatalogError> {
        let _guard = self.write_lock.lock().await;

        let mut items = self.read_items().await?;
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(CatalogError::UnknownItem(id))?;
        item.duration = Some(seconds);

        let body = serde_json::to_string_pretty(&items).map_err(|source| CatalogError::Parse {
            source,
            path: self.path.clone(),
        })?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|source| CatalogError::Io {
                source,
                path: self.path.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, duration: Option<u64>) -> CatalogItem {
        CatalogItem {
            id,
            title: format!("item {id}"),
            content: format!("https://vimeo.com/{id}"),
            duration,
        }
    }

    #[tokio::test]
    async fn test_nulls_only_selects_missing_durations() {
        let catalog = MemoryCatalog::new(vec![item(3, Some(0)), item(1, None), item(2, Some(60))]);

        let ids: Vec<i64> = catalog
            .list(RecalcMode::NullsOnly)
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(catalog.list(RecalcMode::Force).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_memory_updates() {
        let catalog = MemoryCatalog::new(vec![item(1, None)]);
        catalog.update_duration(1, 90).await.unwrap();
        assert_eq!(catalog.get(1).await.unwrap().duration, Some(90));
        assert!(matches!(
            catalog.update_duration(9, 90).await,
            Err(CatalogError::UnknownItem(9))
        ));

        catalog.reject_writes(1).await;
        assert!(matches!(
            catalog.update_duration(1, 91).await,
            Err(CatalogError::Rejected { id: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_json_catalog_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let body = serde_json::to_string(&vec![item(2, Some(300)), item(1, None)]).unwrap();
        std::fs::write(&path, body).unwrap();

        let catalog = JsonCatalog::new(&path);
        catalog.update_duration(1, 729).await.unwrap();

        let reopened = JsonCatalog::new(&path);
        let items = reopened.list(RecalcMode::Force).await.unwrap();
        assert_eq!(items[0].id, 1);
        assert_eq!(items[0].duration, Some(729));
        assert_eq!(items[1].duration, Some(300));
        assert!(reopened.list(RecalcMode::NullsOnly).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_catalog_errors_carry_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        match JsonCatalog::new(&path).list(RecalcMode::Force).await {
            Err(CatalogError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected io error, got {:?}", other),
        }
    }
}
