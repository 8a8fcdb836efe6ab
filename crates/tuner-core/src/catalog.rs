//! In-memory station catalog for the currently selected country.
//!
//! Single writer (the directory client), many readers.  Readers always get
//! value snapshots; nothing holds the lock across its own processing.  The
//! catalog is replaced wholesale on every successful fetch — there is no
//! incremental merge.

use std::collections::BTreeSet;

use tokio::sync::{watch, RwLock};
use tracing::debug;

use crate::station::Station;

pub struct StationCatalog {
    stations: RwLock<Vec<Station>>,
    /// Monotonic revision, bumped on every replace.  Subscribers watch this
    /// and pull a fresh snapshot when it changes.
    rev_tx: watch::Sender<u64>,
}

impl StationCatalog {
    pub fn new() -> Self {
        let (rev_tx, _) = watch::channel(0);
        Self {
            stations: RwLock::new(Vec::new()),
            rev_tx,
        }
    }

    /// Replace the catalog contents atomically.  Stations are ordered by
    /// votes descending (stable for ties, preserving service order).
    pub async fn replace(&self, mut stations: Vec<Station>) {
        stations.sort_by(|a, b| b.votes.cmp(&a.votes));
        let len = stations.len();
        {
            let mut guard = self.stations.write().await;
            *guard = stations;
        }
        self.rev_tx.send_modify(|rev| *rev += 1);
        debug!("catalog replaced: {} stations", len);
    }

    pub async fn snapshot(&self) -> Vec<Station> {
        self.stations.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.stations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stations.read().await.is_empty()
    }

    pub async fn get(&self, station_id: &str) -> Option<Station> {
        self.stations
            .read()
            .await
            .iter()
            .find(|s| s.station_id == station_id)
            .cloned()
    }

    /// Catalog entries whose id is in `ids`, in catalog order.  This is how
    /// the favorites view is derived: favorite status survives wholesale
    /// catalog replacement because only the stable id is matched.
    pub async fn with_ids(&self, ids: &BTreeSet<String>) -> Vec<Station> {
        self.stations
            .read()
            .await
            .iter()
            .filter(|s| ids.contains(&s.station_id))
            .cloned()
            .collect()
    }

    /// Change notification.  The receiver's value is the current revision.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rev_tx.subscribe()
    }
}

impl Default for StationCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str, votes: i64) -> Station {
        Station {
            station_id: id.to_string(),
            change_id: format!("change-{id}"),
            server_id: None,
            name: format!("Station {id}"),
            country: "Austria".to_string(),
            country_code: "AT".to_string(),
            state: None,
            language: None,
            tags: None,
            stream_url: format!("http://example.com/{id}"),
            resolved_stream_url: format!("https://example.com/{id}"),
            homepage: String::new(),
            favicon_url: None,
            codec: None,
            bitrate_kbps: 128,
            votes,
            last_check_ok: 1,
            click_count: 0,
            click_trend: 0,
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_replace_orders_by_votes_descending() {
        let catalog = StationCatalog::new();
        catalog
            .replace(vec![station("a", 5), station("b", 90), station("c", 40)])
            .await;
        let ids: Vec<String> = catalog
            .snapshot()
            .await
            .into_iter()
            .map(|s| s.station_id)
            .collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_replace_bumps_revision() {
        let catalog = StationCatalog::new();
        let rx = catalog.subscribe();
        assert_eq!(*rx.borrow(), 0);
        catalog.replace(vec![station("a", 1)]).await;
        assert_eq!(*rx.borrow(), 1);
        catalog.replace(Vec::new()).await;
        assert_eq!(*rx.borrow(), 2);
        assert!(catalog.is_empty().await);
    }

    #[tokio::test]
    async fn test_with_ids_filters_in_catalog_order() {
        let catalog = StationCatalog::new();
        catalog
            .replace(vec![station("a", 5), station("b", 90), station("c", 40)])
            .await;
        let ids: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let favorites = catalog.with_ids(&ids).await;
        let got: Vec<&str> = favorites.iter().map(|s| s.station_id.as_str()).collect();
        assert_eq!(got, ["b", "a"]);
    }
}
