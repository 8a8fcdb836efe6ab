//! Station directory client.
//!
//! Fetches and decodes the station list for a country code against a
//! DNS-resolved mirror, with a fixed-mirror fallback when a mirror hands
//! back a corrupted body.  Progress and outcome are published through a
//! `watch` channel as a `FetchResult`; the catalog is replaced on success.
//!
//! Overlapping fetches are deliberately not serialized: whichever call
//! completes last owns the published result (last-completion-wins).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::catalog::StationCatalog;
use crate::config::DirectoryConfig;
use crate::error::FetchError;
use crate::resolve::HostResolver;
use crate::station::Station;

/// Bodies under this size are "no stations for this country": some mirrors
/// answer unsupported country codes with a near-empty body instead of an
/// HTTP error.
const EMPTY_PAYLOAD_BYTES: usize = 10;

/// Lifecycle of an asynchronous fetch, as observed by the UI.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchResult<T> {
    /// Nothing fetched yet, or the last fetch found no stations.
    #[default]
    Empty,
    InProgress,
    Success(T),
    Failure(FetchError),
}

pub struct StationDirectoryClient {
    http: reqwest::Client,
    resolver: HostResolver,
    endpoints: DirectoryConfig,
    catalog: Arc<StationCatalog>,
    result_tx: watch::Sender<FetchResult<Vec<Station>>>,
}

impl StationDirectoryClient {
    pub fn new(
        endpoints: DirectoryConfig,
        resolver: HostResolver,
        catalog: Arc<StationCatalog>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoints.request_timeout_secs))
            .build()?;
        let (result_tx, _) = watch::channel(FetchResult::Empty);
        Ok(Self {
            http,
            resolver,
            endpoints,
            catalog,
            result_tx,
        })
    }

    /// Current fetch state, by value.
    pub fn result(&self) -> FetchResult<Vec<Station>> {
        self.result_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchResult<Vec<Station>>> {
        self.result_tx.subscribe()
    }

    pub fn catalog(&self) -> Arc<StationCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Fetch the station list for `country_code` and publish the outcome.
    ///
    /// Every call terminates the published state in exactly one of
    /// `Empty`, `Success`, or `Failure` — transport failures (including
    /// timeout, which is bounded by the client's request timeout) surface
    /// as `Failure` rather than leaving `InProgress` dangling.
    pub async fn fetch_stations(&self, country_code: &str) {
        self.result_tx.send_replace(FetchResult::InProgress);

        let base = self.primary_base().await;
        let url = station_list_url(&base, country_code);
        info!("fetching stations: {}", url);

        let body = match self.get_bytes(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("directory fetch transport error: {}", e);
                self.result_tx
                    .send_replace(FetchResult::Failure(FetchError::Transport(e.to_string())));
                return;
            }
        };

        match serde_json::from_slice::<Vec<Station>>(&body) {
            Ok(_) if body.len() < EMPTY_PAYLOAD_BYTES => {
                info!("near-empty body for {}, treating as no stations", country_code);
                self.result_tx.send_replace(FetchResult::Empty);
            }
            Ok(stations) => {
                info!("decoded {} stations for {}", stations.len(), country_code);
                self.catalog.replace(stations.clone()).await;
                self.result_tx.send_replace(FetchResult::Success(stations));
            }
            Err(e) if is_corrupted_payload(&e) => {
                warn!("corrupted station payload ({}), using fallback mirror", e);
                self.fetch_fallback().await;
            }
            Err(e) => {
                warn!("station payload does not match schema: {}", e);
                self.result_tx
                    .send_replace(FetchResult::Failure(FetchError::Decode(e.to_string())));
            }
        }
    }

    /// Fixed-mirror, fixed-country fetch used when the resolved mirror hands
    /// back garbage.  On success the catalog holds the fallback country's
    /// stations regardless of what was originally requested.
    async fn fetch_fallback(&self) {
        let base = self.endpoints.fallback_base.trim_end_matches('/');
        let url = station_list_url(base, &self.endpoints.fallback_country);
        info!("fallback fetch: {}", url);

        let body = match self.get_bytes(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("fallback fetch transport error: {}", e);
                self.result_tx
                    .send_replace(FetchResult::Failure(FetchError::Transport(e.to_string())));
                return;
            }
        };

        match serde_json::from_slice::<Vec<Station>>(&body) {
            Ok(stations) => {
                info!("fallback decoded {} stations", stations.len());
                self.catalog.replace(stations.clone()).await;
                self.result_tx.send_replace(FetchResult::Success(stations));
            }
            Err(e) => {
                warn!("fallback payload undecodable: {}", e);
                self.result_tx
                    .send_replace(FetchResult::Failure(FetchError::Decode(e.to_string())));
            }
        }
    }

    /// Base URL for the primary fetch: the pinned override when configured,
    /// otherwise a freshly resolved mirror, otherwise the hardcoded default.
    async fn primary_base(&self) -> String {
        if let Some(base) = &self.endpoints.mirror_override {
            return base.trim_end_matches('/').to_string();
        }
        let mirror = match self.resolver.mirror_hostname(&self.endpoints.lookup_host).await {
            Some(mirror) => mirror,
            None => {
                warn!(
                    "mirror resolution failed, using default {}",
                    self.endpoints.default_mirror
                );
                self.endpoints.default_mirror.clone()
            }
        };
        format!("https://{}", mirror)
    }

    async fn get_bytes(&self, url: &str) -> reqwest::Result<Vec<u8>> {
        // Status codes are not inspected: mirrors have been seen returning
        // 200 with junk and non-200 with usable bodies alike.  The decoder
        // and the corrupted-payload fallback sort it out.
        let resp = self.http.get(url).send().await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

fn station_list_url(base: &str, country_code: &str) -> String {
    format!("{}/json/stations/bycountrycodeexact/{}", base, country_code)
}

/// Malformed JSON (truncation, HTML error pages, garbage) takes the
/// fallback path.  Schema mismatches on well-formed JSON are surfaced
/// instead, since the fallback mirror would decode no better.
fn is_corrupted_payload(e: &serde_json::Error) -> bool {
    matches!(
        e.classify(),
        serde_json::error::Category::Syntax | serde_json::error::Category::Eof
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_list_url() {
        assert_eq!(
            station_list_url("https://at1.api.radio-browser.info", "DE"),
            "https://at1.api.radio-browser.info/json/stations/bycountrycodeexact/DE"
        );
    }

    #[test]
    fn test_corrupted_payload_classification() {
        let syntax = serde_json::from_str::<Vec<Station>>("<html>oops").unwrap_err();
        assert!(is_corrupted_payload(&syntax));

        let truncated = serde_json::from_str::<Vec<Station>>("[{\"name\":").unwrap_err();
        assert!(is_corrupted_payload(&truncated));

        // Well-formed JSON that misses required fields is a schema error,
        // not corruption.
        let schema = serde_json::from_str::<Vec<Station>>("[{\"name\":\"x\"}]").unwrap_err();
        assert!(!is_corrupted_payload(&schema));
    }

    #[test]
    fn test_fetch_result_default_is_empty() {
        let r: FetchResult<Vec<Station>> = FetchResult::default();
        assert_eq!(r, FetchResult::Empty);
    }
}
