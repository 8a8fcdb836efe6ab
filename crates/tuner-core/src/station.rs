use serde::{Deserialize, Serialize};

/// One internet radio stream entry as returned by the directory service.
///
/// `station_id` is the stable identifier assigned by the remote service and
/// is the join key across the catalog, favorites, and the playback
/// coordinator.  It is never regenerated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(rename = "stationuuid")]
    pub station_id: String,
    #[serde(rename = "changeuuid")]
    pub change_id: String,
    #[serde(rename = "serveruuid", default)]
    pub server_id: Option<String>,

    pub name: String,
    pub country: String,
    #[serde(rename = "countrycode")]
    pub country_code: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Comma-separated genre/style tags, as the service ships them.
    #[serde(default)]
    pub tags: Option<String>,

    /// Stream URL as registered with the directory.
    #[serde(rename = "url")]
    pub stream_url: String,
    /// Redirect-resolved stream URL.  Preferred for playback.
    #[serde(rename = "url_resolved")]
    pub resolved_stream_url: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(rename = "favicon", default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(rename = "bitrate")]
    pub bitrate_kbps: u32,

    /// Vote count — default catalog ordering is votes descending.
    pub votes: i64,
    /// 0/1 flag from the service's last availability check.
    #[serde(rename = "lastcheckok")]
    pub last_check_ok: i64,
    #[serde(rename = "clickcount")]
    pub click_count: i64,
    #[serde(rename = "clicktrend")]
    pub click_trend: i64,

    /// Audit timestamps, ISO variants, geo coordinates, ssl-error and
    /// extended-info flags.  Carried opaquely; core logic never reads them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Station {
    /// URL to hand to the media backend.  The resolved form is preferred;
    /// some mirrors leave it blank, in which case the original is used.
    pub fn playback_url(&self) -> &str {
        if self.resolved_stream_url.is_empty() {
            &self.stream_url
        } else {
            &self.resolved_stream_url
        }
    }
}
