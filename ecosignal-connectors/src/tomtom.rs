//! TomTom flow-segment traffic provider
//!
//! Segments are configured as a coordinate on the road; TomTom snaps the
//! point to the nearest segment and reports speeds for it:
//!
//! ```text
//! GET {base}/traffic/services/4/flowSegmentData/absolute/10/json?point={lat},{lon}&key=…
//!
//! { "flowSegmentData": { "currentSpeed": 21, "freeFlowSpeed": 60,
//!                        "currentTravelTime": 171, "freeFlowTravelTime": 60,
//!                        "confidence": 0.97, "roadClosure": false } }
//! ```
//!
//! Congestion is derived as `1 - current/free_flow`. A closed road reads as
//! fully congested at zero speed.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ecosignal_core::{SystemTime, TimeSource, Timestamp, TrafficReading};
use serde::{Deserialize, Serialize};

use crate::http::{HttpClient, HttpConfig};
use crate::{ProviderError, ProviderResult, ProviderStats, TrafficProvider};

/// Default TomTom API endpoint
pub const TOMTOM_BASE_URL: &str = "https://api.tomtom.com";

const FLOW_SEGMENT_PATH: &str = "/traffic/services/4/flowSegmentData/absolute/10/json";

/// Point on the road identifying a segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentPoint {
    pub lat: f64,
    pub lon: f64,
}

impl SegmentPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    fn query_value(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowResponse {
    flow_segment_data: FlowSegmentData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowSegmentData {
    current_speed: f64,
    free_flow_speed: f64,
    #[serde(default)]
    road_closure: bool,
}

/// Parse a flow-segment payload into a reading for `segment_id`
pub fn parse_flow_segment(
    segment_id: &str,
    payload: serde_json::Value,
    captured_at: Timestamp,
) -> ProviderResult<TrafficReading> {
    let response: FlowResponse = serde_json::from_value(payload)
        .map_err(|e| ProviderError::Format(format!("TomTom {segment_id}: {e}")))?;
    let flow = response.flow_segment_data;

    if flow.free_flow_speed.is_nan() || flow.free_flow_speed <= 0.0 {
        return Err(ProviderError::Format(format!(
            "TomTom {segment_id}: free-flow speed {} is not positive",
            flow.free_flow_speed
        )));
    }

    if flow.road_closure {
        return Ok(TrafficReading::new(
            segment_id,
            0.0,
            flow.free_flow_speed,
            1.0,
            captured_at,
        ));
    }
    Ok(TrafficReading::from_speeds(
        segment_id,
        flow.current_speed,
        flow.free_flow_speed,
        captured_at,
    ))
}

/// Traffic provider backed by the TomTom flow-segment API
pub struct TomTomProvider {
    http: HttpClient,
    segments: BTreeMap<String, SegmentPoint>,
    clock: Arc<dyn TimeSource>,
}

impl TomTomProvider {
    /// Provider against the public endpoint
    pub fn new(api_key: impl Into<String>) -> ProviderResult<Self> {
        Self::with_config(HttpConfig::new(TOMTOM_BASE_URL).api_key("key", api_key))
    }

    /// Provider with a custom HTTP configuration; the config must carry the key
    pub fn with_config(config: HttpConfig) -> ProviderResult<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
            segments: BTreeMap::new(),
            clock: Arc::new(SystemTime),
        })
    }

    /// Register the road point for a segment id
    pub fn with_segment(mut self, segment_id: impl Into<String>, point: SegmentPoint) -> Self {
        self.segments.insert(segment_id.into(), point);
        self
    }

    pub fn with_segments(
        mut self,
        segments: impl IntoIterator<Item = (String, SegmentPoint)>,
    ) -> Self {
        self.segments.extend(segments);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn segment(&self, segment_id: &str) -> Option<&SegmentPoint> {
        self.segments.get(segment_id)
    }
}

#[async_trait]
impl TrafficProvider for TomTomProvider {
    async fn fetch_traffic(&self, segment_id: &str) -> ProviderResult<TrafficReading> {
        let result = match self.segments.get(segment_id) {
            None => Err(ProviderError::UnknownSource(segment_id.to_string())),
            Some(point) => {
                let query = [("point", point.query_value())];
                match self.http.get_json(FLOW_SEGMENT_PATH, &query).await {
                    Ok(payload) => parse_flow_segment(segment_id, payload, self.clock.now()),
                    Err(e) => Err(e),
                }
            }
        };
        self.http.stats_cell().record(&result);
        result
    }

    fn name(&self) -> &str {
        "tomtom"
    }

    fn stats(&self) -> ProviderStats {
        self.http.stats_cell().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_flow_segment() {
        let payload = json!({
            "flowSegmentData": {
                "frc": "FRC2",
                "currentSpeed": 21,
                "freeFlowSpeed": 60,
                "currentTravelTime": 171,
                "freeFlowTravelTime": 60,
                "confidence": 0.97,
                "roadClosure": false
            }
        });
        let reading = parse_flow_segment("mg-1", payload, 1_000).unwrap();
        assert_eq!(reading.segment_id, "mg-1");
        assert_eq!(reading.current_speed, 21.0);
        assert_eq!(reading.free_flow_speed, 60.0);
        assert!((reading.congestion - 0.65).abs() < 1e-9);
        assert_eq!(reading.captured_at, 1_000);
    }

    #[test]
    fn closed_road_is_fully_congested() {
        let payload = json!({
            "flowSegmentData": { "currentSpeed": 45, "freeFlowSpeed": 50, "roadClosure": true }
        });
        let reading = parse_flow_segment("mg-1", payload, 0).unwrap();
        assert_eq!(reading.current_speed, 0.0);
        assert_eq!(reading.congestion, 1.0);
    }

    #[test]
    fn missing_fields_are_format_violations() {
        let payload = json!({ "detailedError": { "message": "Point too far from nearest segment" } });
        assert!(parse_flow_segment("mg-1", payload, 0)
            .unwrap_err()
            .is_format_violation());

        let payload = json!({ "flowSegmentData": { "currentSpeed": 10, "freeFlowSpeed": 0 } });
        assert!(parse_flow_segment("mg-1", payload, 0)
            .unwrap_err()
            .is_format_violation());
    }

    #[tokio::test]
    async fn unknown_segment_fails_without_request() {
        let provider = TomTomProvider::new("key")
            .unwrap()
            .with_segment("mg-1", SegmentPoint::new(12.9756, 77.6066));

        assert_eq!(
            provider.fetch_traffic("hosur-9").await,
            Err(ProviderError::UnknownSource("hosur-9".into()))
        );
        assert_eq!(provider.stats().requests_failed, 1);
        assert!(provider.segment("mg-1").is_some());
    }

    #[test]
    fn point_formats_as_lat_lon() {
        assert_eq!(
            SegmentPoint::new(12.9756, 77.6066).query_value(),
            "12.9756,77.6066"
        );
    }
}
