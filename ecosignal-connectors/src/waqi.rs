//! World Air Quality Index feed provider
//!
//! `GET {base}/feed/{location}/?token=…` returns, for a city or station:
//!
//! ```json
//! { "status": "ok",
//!   "data": { "aqi": 113,
//!             "iaqi": { "pm25": { "v": 45.5 }, "pm10": { "v": 78.2 }, "t": { "v": 27.0 } },
//!             "time": { "iso": "2024-11-05T14:00:00+05:30", "v": 1730815200 } } }
//! ```
//!
//! Only pollutant entries of `iaqi` are kept; weather entries (t, h, p, w)
//! are dropped. A `status` other than `"ok"` or an `aqi` of `"-"` (station
//! offline) is a format violation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ecosignal_core::{AirQualityReading, SystemTime, TimeSource, Timestamp};
use serde::Deserialize;

use crate::http::{HttpClient, HttpConfig};
use crate::{AirQualityProvider, ProviderError, ProviderResult, ProviderStats};

/// Default WAQI API endpoint
pub const WAQI_BASE_URL: &str = "https://api.waqi.info";

/// `iaqi` keys that are pollutant concentrations
const POLLUTANTS: [&str; 6] = ["pm25", "pm10", "no2", "so2", "co", "o3"];

#[derive(Deserialize)]
struct FeedResponse {
    status: String,
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct FeedData {
    aqi: serde_json::Value,
    #[serde(default)]
    iaqi: BTreeMap<String, IaqiEntry>,
    time: Option<FeedTime>,
}

#[derive(Deserialize)]
struct IaqiEntry {
    v: f64,
}

#[derive(Deserialize)]
struct FeedTime {
    iso: Option<String>,
    v: Option<i64>,
}

/// Parse a WAQI feed payload into a reading for `location_id`
pub fn parse_feed(
    location_id: &str,
    payload: serde_json::Value,
    fallback_time: Timestamp,
) -> ProviderResult<AirQualityReading> {
    let response: FeedResponse = serde_json::from_value(payload)
        .map_err(|e| ProviderError::Format(format!("WAQI {location_id}: {e}")))?;
    if response.status != "ok" {
        return Err(ProviderError::Format(format!(
            "WAQI {location_id}: status {} ({})",
            response.status, response.data
        )));
    }

    let data: FeedData = serde_json::from_value(response.data)
        .map_err(|e| ProviderError::Format(format!("WAQI {location_id}: {e}")))?;
    let index_value = data.aqi.as_f64().ok_or_else(|| {
        ProviderError::Format(format!("WAQI {location_id}: no AQI reported ({})", data.aqi))
    })?;

    let captured_at = data
        .time
        .as_ref()
        .and_then(feed_timestamp)
        .unwrap_or(fallback_time);

    let mut reading = AirQualityReading::new(location_id, index_value, captured_at);
    for (name, entry) in data.iaqi {
        if POLLUTANTS.contains(&name.as_str()) {
            reading = reading.with_pollutant(name, entry.v);
        }
    }
    Ok(reading)
}

fn feed_timestamp(time: &FeedTime) -> Option<Timestamp> {
    let from_iso = time
        .iso
        .as_deref()
        .and_then(|iso| chrono::DateTime::parse_from_rfc3339(iso).ok())
        .and_then(|dt| u64::try_from(dt.timestamp_millis()).ok());
    from_iso.or_else(|| {
        time.v
            .and_then(|secs| u64::try_from(secs).ok())
            .map(|secs| secs * 1000)
    })
}

/// Air-quality provider backed by the WAQI feed API
pub struct WaqiProvider {
    http: HttpClient,
    clock: Arc<dyn TimeSource>,
}

impl WaqiProvider {
    /// Provider against the public endpoint
    pub fn new(token: impl Into<String>) -> ProviderResult<Self> {
        Self::with_config(HttpConfig::new(WAQI_BASE_URL).api_key("token", token))
    }

    /// Provider with a custom HTTP configuration; the config must carry the token
    pub fn with_config(config: HttpConfig) -> ProviderResult<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
            clock: Arc::new(SystemTime),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl AirQualityProvider for WaqiProvider {
    async fn fetch_air_quality(&self, location_id: &str) -> ProviderResult<AirQualityReading> {
        let path = format!("/feed/{location_id}/");
        let result = match self.http.get_json(&path, &[]).await {
            Ok(payload) => parse_feed(location_id, payload, self.clock.now()),
            Err(e) => Err(e),
        };
        self.http.stats_cell().record(&result);
        result
    }

    fn name(&self) -> &str {
        "waqi"
    }

    fn stats(&self) -> ProviderStats {
        self.http.stats_cell().snapshot()
    }
}
