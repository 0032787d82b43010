use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    insert_into_collection, last_display_id, replace_in_collection, NewOrder, OrderStore,
    Revision, StoreError,
};
use crate::domain::order::Order;

// ============================================================================
// JSON File Order Store
// ============================================================================
//
// The whole collection is one JSON array, rewritten on every mutation:
// 1. Wait for the write gate (tokio Mutex, FIFO)
// 2. Read the committed collection
// 3. Apply the change in memory
// 4. Write a sibling temp file and fsync it
// 5. rename() over the primary file
//
// A failure anywhere before step 5 leaves the committed file untouched.
// Readers skip the gate; rename guarantees they see old or new, never half.
//
// ============================================================================

pub struct JsonFileOrderStore {
    path: PathBuf,
    write_gate: Mutex<()>,
}

impl JsonFileOrderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_gate: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Committed collection. A missing or empty file is an empty collection.
    async fn read_collection(&self) -> Result<Vec<Order>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_collection(&self, orders: &[Order]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(orders)?;
        let temp_path = self.temp_path();

        if let Err(e) = write_synced(&temp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(
            path = %self.path.display(),
            order_count = orders.len(),
            "Committed order collection"
        );

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "orders.json".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()))
    }

    async fn mutate<F>(&self, change: F) -> Result<Order, StoreError>
    where
        F: FnOnce(&mut Vec<Order>) -> Result<Order, StoreError>,
    {
        let _turn = self.write_gate.lock().await;

        let mut orders = self.read_collection().await?;
        let result = change(&mut orders)?;
        self.write_collection(&orders).await?;

        Ok(result)
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl OrderStore for JsonFileOrderStore {
    async fn get_all(&self) -> Vec<Order> {
        match self.read_collection().await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Order file unreadable, serving empty collection"
                );
                Vec::new()
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Option<Order> {
        self.get_all().await.into_iter().find(|o| o.id == id)
    }

    async fn create(&self, order: Order) -> Result<Order, StoreError> {
        self.mutate(|orders| insert_into_collection(orders, order))
            .await
    }

    async fn create_next(&self, build: NewOrder) -> Result<Order, StoreError> {
        self.mutate(|orders| {
            let order = build(last_display_id(orders));
            insert_into_collection(orders, order)
        })
        .await
    }

    async fn update(&self, order: Order) -> Result<Order, StoreError> {
        self.mutate(|orders| replace_in_collection(orders, order, None))
            .await
    }

    async fn compare_and_update(&self, order: Order, read: Revision) -> Result<Order, StoreError> {
        self.mutate(|orders| replace_in_collection(orders, order, Some(read)))
            .await
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_order;
    use crate::domain::order::OrderStatus;
    use futures_util::future::join_all;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn store_in(dir: &tempfile::TempDir) -> JsonFileOrderStore {
        JsonFileOrderStore::new(dir.path().join("orders.json"))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let order = sample_order(OrderStatus::New);

        store.create(order.clone()).await.unwrap();

        assert_eq!(store.find_by_id(order.id).await, Some(order));
    }

    #[tokio::test]
    async fn test_collection_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = sample_order(OrderStatus::New);
        let second = sample_order(OrderStatus::Prep);
        {
            let store = store_in(&dir);
            store.create(first.clone()).await.unwrap();
            store.create(second.clone()).await.unwrap();
        }

        let reopened = store_in(&dir);
        assert_eq!(reopened.get_all().await, vec![first, second]);
    }

    #[tokio::test]
    async fn test_corrupt_file_degrades_reads_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        tokio::fs::write(store.path(), b"[{\"id\": ").await.unwrap();

        assert!(store.get_all().await.is_empty());
        assert!(store.find_by_id(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_writes_and_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        tokio::fs::write(store.path(), b"not json").await.unwrap();

        let err = store.create(sample_order(OrderStatus::New)).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));

        let on_disk = tokio::fs::read(store.path()).await.unwrap();
        assert_eq!(on_disk, b"not json");
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.create(sample_order(OrderStatus::New)).await.unwrap();

        let err = store.update(sample_order(OrderStatus::New)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.get_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_update_rejects_stale_revision() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let order = store.create(sample_order(OrderStatus::New)).await.unwrap();
        let read = Revision::of(&order);

        let mut to_prep = order.clone();
        to_prep.apply_transition(OrderStatus::Prep, None).unwrap();
        store.compare_and_update(to_prep, read).await.unwrap();

        let mut stale = order.clone();
        stale.apply_transition(OrderStatus::Cancelled, None).unwrap();
        let err = store.compare_and_update(stale, read).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { stored, .. } if stored.status == OrderStatus::Prep));

        let stored = store.find_by_id(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Prep);
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.create(sample_order(OrderStatus::New)).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["orders.json".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_creates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir));

        let tasks = (0..20).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.create(sample_order(OrderStatus::New)).await })
        });
        for joined in join_all(tasks).await {
            joined.unwrap().unwrap();
        }

        let persisted = store.get_all().await;
        let ids: HashSet<_> = persisted.iter().map(|o| o.id).collect();
        assert_eq!(persisted.len(), 20);
        assert_eq!(ids.len(), 20);
    }

    #[tokio::test]
    async fn test_concurrent_create_next_gets_distinct_tickets() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir));

        let tasks = (0..8).map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .create_next(Box::new(|last| {
                        let mut order = sample_order(OrderStatus::New);
                        order.display_id = last + 1;
                        order
                    }))
                    .await
            })
        });
        for joined in join_all(tasks).await {
            joined.unwrap().unwrap();
        }

        let mut tickets: Vec<u32> = store.get_all().await.iter().map(|o| o.display_id).collect();
        tickets.sort_unstable();
        assert_eq!(tickets, (1..=8).collect::<Vec<_>>());
    }
}
