//! Persisted favorites.
//!
//! A set of station ids backed by a single JSON file.  Loaded once at
//! startup; every mutation rewrites the whole file before the lock is
//! released, so the on-disk slot always reflects the last completed
//! mutation.  Ids are the service-assigned `station_id`, which stays stable
//! across wholesale catalog replacement.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

pub struct FavoritesStore {
    ids: Mutex<BTreeSet<String>>,
    file: PathBuf,
    rev_tx: watch::Sender<u64>,
}

impl FavoritesStore {
    /// Load the store from `file`.  A missing or unreadable slot starts the
    /// set empty rather than failing startup.
    pub fn load(file: PathBuf) -> Self {
        let ids = Self::read_slot(&file);
        debug!("loaded {} favorites from {:?}", ids.len(), file);
        let (rev_tx, _) = watch::channel(0);
        Self {
            ids: Mutex::new(ids),
            file,
            rev_tx,
        }
    }

    fn read_slot(file: &PathBuf) -> BTreeSet<String> {
        match std::fs::read_to_string(file) {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(list) => list.into_iter().collect(),
                Err(e) => {
                    warn!("favorites slot corrupt ({}), starting empty", e);
                    BTreeSet::new()
                }
            },
            Err(_) => BTreeSet::new(),
        }
    }

    pub async fn is_favorite(&self, station_id: &str) -> bool {
        self.ids.lock().await.contains(station_id)
    }

    /// Stable membership snapshot, in id order.
    pub async fn list(&self) -> Vec<String> {
        self.ids.lock().await.iter().cloned().collect()
    }

    pub async fn id_set(&self) -> BTreeSet<String> {
        self.ids.lock().await.clone()
    }

    /// Add `station_id`.  Idempotent; the slot is only rewritten when
    /// membership actually changes.
    pub async fn add(&self, station_id: &str) -> anyhow::Result<()> {
        let mut ids = self.ids.lock().await;
        if ids.insert(station_id.to_string()) {
            self.save(&ids).await?;
            self.rev_tx.send_modify(|rev| *rev += 1);
        }
        Ok(())
    }

    /// Remove `station_id`.  Removing a non-member is a no-op.
    pub async fn remove(&self, station_id: &str) -> anyhow::Result<()> {
        let mut ids = self.ids.lock().await;
        if ids.remove(station_id) {
            self.save(&ids).await?;
            self.rev_tx.send_modify(|rev| *rev += 1);
        }
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rev_tx.subscribe()
    }

    // Full rewrite of the slot, called with the membership lock held.
    async fn save(&self, ids: &BTreeSet<String>) -> anyhow::Result<()> {
        if let Some(parent) = self.file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let list: Vec<&String> = ids.iter().collect();
        let json = serde_json::to_string_pretty(&list)?;
        tokio::fs::write(&self.file, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_slot() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("favorites.json");
        (dir, file)
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let (_dir, file) = temp_slot();
        let store = FavoritesStore::load(file);
        store.add("abc").await.unwrap();
        store.add("abc").await.unwrap();
        assert_eq!(store.list().await, vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_non_member_is_noop() {
        let (_dir, file) = temp_slot();
        let store = FavoritesStore::load(file);
        store.add("abc").await.unwrap();
        store.remove("nope").await.unwrap();
        assert!(store.is_favorite("abc").await);
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_roundtrip_across_restart() {
        let (_dir, file) = temp_slot();
        {
            let store = FavoritesStore::load(file.clone());
            store.add("b").await.unwrap();
            store.add("a").await.unwrap();
            store.add("c").await.unwrap();
            store.remove("b").await.unwrap();
        }
        let reloaded = FavoritesStore::load(file);
        let mut expected: Vec<String> = vec!["a".into(), "c".into()];
        expected.sort();
        assert_eq!(reloaded.list().await, expected);
    }

    #[tokio::test]
    async fn test_corrupt_slot_loads_empty() {
        let (_dir, file) = temp_slot();
        std::fs::write(&file, "{not json").unwrap();
        let store = FavoritesStore::load(file);
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_bumps_revision_only_on_change() {
        let (_dir, file) = temp_slot();
        let store = FavoritesStore::load(file);
        let rx = store.subscribe();
        store.add("abc").await.unwrap();
        assert_eq!(*rx.borrow(), 1);
        store.add("abc").await.unwrap();
        assert_eq!(*rx.borrow(), 1);
        store.remove("abc").await.unwrap();
        assert_eq!(*rx.borrow(), 2);
    }
}
