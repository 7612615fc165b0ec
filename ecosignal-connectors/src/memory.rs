//! Scripted in-memory provider
//!
//! Serves fixed readings or errors per id, optionally after an artificial
//! delay. Implements both provider traits, so one instance can stand in for
//! WAQI and TomTom in tests and offline runs. Scripts can be changed between
//! ticks through `&self`.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ecosignal_core::{AirQualityReading, TrafficReading};

use crate::{
    AirQualityProvider, ProviderError, ProviderResult, ProviderStats, StatsCell, TrafficProvider,
};

#[derive(Debug, Default)]
struct Script {
    air_quality: BTreeMap<String, ProviderResult<AirQualityReading>>,
    traffic: BTreeMap<String, ProviderResult<TrafficReading>>,
    delays: BTreeMap<String, Duration>,
    default_delay: Duration,
}

/// Provider serving scripted readings
#[derive(Debug, Default)]
pub struct StaticProvider {
    script: Mutex<Script>,
    stats: StatsCell,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_air_quality(self, reading: AirQualityReading) -> Self {
        self.set_air_quality(reading);
        self
    }

    pub fn with_traffic(self, reading: TrafficReading) -> Self {
        self.set_traffic(reading);
        self
    }

    /// Fail air-quality calls for `location_id`
    pub fn with_air_quality_failure(
        self,
        location_id: impl Into<String>,
        error: ProviderError,
    ) -> Self {
        self.set_air_quality_failure(location_id, error);
        self
    }

    /// Fail traffic calls for `segment_id`
    pub fn with_traffic_failure(self, segment_id: impl Into<String>, error: ProviderError) -> Self {
        self.set_traffic_failure(segment_id, error);
        self
    }

    /// Delay every call by `delay`
    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    /// Delay calls for one id (location or segment)
    pub fn with_delay_for(self, id: impl Into<String>, delay: Duration) -> Self {
        self.script().delays.insert(id.into(), delay);
        self
    }

    pub fn set_air_quality(&self, reading: AirQualityReading) {
        self.script()
            .air_quality
            .insert(reading.location_id.clone(), Ok(reading));
    }

    pub fn set_traffic(&self, reading: TrafficReading) {
        self.script()
            .traffic
            .insert(reading.segment_id.clone(), Ok(reading));
    }

    pub fn set_air_quality_failure(&self, location_id: impl Into<String>, error: ProviderError) {
        self.script().air_quality.insert(location_id.into(), Err(error));
    }

    pub fn set_traffic_failure(&self, segment_id: impl Into<String>, error: ProviderError) {
        self.script().traffic.insert(segment_id.into(), Err(error));
    }

    pub fn set_delay(&self, delay: Duration) {
        self.script().default_delay = delay;
    }

    /// Forget every scripted reading and failure
    pub fn clear(&self) {
        let mut script = self.script();
        script.air_quality.clear();
        script.traffic.clear();
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn delay_for(&self, id: &str) -> Duration {
        let script = self.script();
        script.delays.get(id).copied().unwrap_or(script.default_delay)
    }

    async fn pause(&self, id: &str) {
        let delay = self.delay_for(id);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AirQualityProvider for StaticProvider {
    async fn fetch_air_quality(&self, location_id: &str) -> ProviderResult<AirQualityReading> {
        self.pause(location_id).await;
        let result = self
            .script()
            .air_quality
            .get(location_id)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::UnknownSource(location_id.to_string())));
        self.stats.record(&result);
        result
    }

    fn name(&self) -> &str {
        "static"
    }

    fn stats(&self) -> ProviderStats {
        self.stats.snapshot()
    }
}

#[async_trait]
impl TrafficProvider for StaticProvider {
    async fn fetch_traffic(&self, segment_id: &str) -> ProviderResult<TrafficReading> {
        self.pause(segment_id).await;
        let result = self
            .script()
            .traffic
            .get(segment_id)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::UnknownSource(segment_id.to_string())));
        self.stats.record(&result);
        result
    }

    fn name(&self) -> &str {
        "static"
    }

    fn stats(&self) -> ProviderStats {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_scripted_readings() {
        let provider = StaticProvider::new()
            .with_air_quality(AirQualityReading::new("blr", 113.0, 5))
            .with_traffic(TrafficReading::from_speeds("mg-1", 21.0, 60.0, 5));

        let air = provider.fetch_air_quality("blr").await.unwrap();
        assert_eq!(air.index_value, 113.0);
        let traffic = provider.fetch_traffic("mg-1").await.unwrap();
        assert_eq!(traffic.current_speed, 21.0);
        assert_eq!(AirQualityProvider::stats(&provider).readings_fetched, 2);
    }

    #[tokio::test]
    async fn unscripted_id_is_unknown() {
        let provider = StaticProvider::new();
        assert_eq!(
            provider.fetch_air_quality("nowhere").await,
            Err(ProviderError::UnknownSource("nowhere".into()))
        );
    }

    #[tokio::test]
    async fn injected_failures_are_returned() {
        let provider = StaticProvider::new()
            .with_traffic_failure("mg-1", ProviderError::Format("bad payload".into()));
        assert!(provider
            .fetch_traffic("mg-1")
            .await
            .unwrap_err()
            .is_format_violation());
        assert_eq!(
            TrafficProvider::stats(&provider).last_error.as_deref(),
            Some("Data format violation: bad payload")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delay_applies_per_id() {
        let provider = StaticProvider::new()
            .with_air_quality(AirQualityReading::new("slow", 50.0, 0))
            .with_air_quality(AirQualityReading::new("fast", 50.0, 0))
            .with_delay_for("slow", Duration::from_secs(30));

        let start = tokio::time::Instant::now();
        provider.fetch_air_quality("fast").await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));

        provider.fetch_air_quality("slow").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn scripts_change_between_calls() {
        let provider =
            StaticProvider::new().with_air_quality(AirQualityReading::new("blr", 80.0, 0));
        provider.set_air_quality(AirQualityReading::new("blr", 190.0, 60_000));
        assert_eq!(
            provider.fetch_air_quality("blr").await.unwrap().index_value,
            190.0
        );

        provider.clear();
        assert!(provider.fetch_air_quality("blr").await.is_err());
    }
}
