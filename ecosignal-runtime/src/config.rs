//! Runtime configuration
//!
//! One JSON document, loaded once at startup:
//!
//! ```json
//! {
//!   "engine":   { "tick_interval_secs": 60, "intersections": [...], "corridors": [...] },
//!   "waqi":     { "api_key": "..." },
//!   "tomtom":   { "api_key": "...", "max_retries": 1 },
//!   "segments": { "mg-1": { "lat": 12.9756, "lon": 77.6066 } }
//! }
//! ```
//!
//! Empty API keys are filled from `ECOSIGNAL_WAQI_TOKEN` and
//! `ECOSIGNAL_TOMTOM_KEY` so the file can be committed without secrets.
//! Changing anything requires a restart.

use std::collections::BTreeMap;
use std::path::Path;

use ecosignal_connectors::tomtom::TOMTOM_BASE_URL;
use ecosignal_connectors::waqi::WAQI_BASE_URL;
use ecosignal_connectors::{HttpConfig, SegmentPoint, TomTomProvider, WaqiProvider};
use ecosignal_core::EngineConfig;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{RuntimeError, RuntimeResult};

/// Environment variable supplying the WAQI token
pub const WAQI_TOKEN_VAR: &str = "ECOSIGNAL_WAQI_TOKEN";
/// Environment variable supplying the TomTom key
pub const TOMTOM_KEY_VAR: &str = "ECOSIGNAL_TOMTOM_KEY";

/// Connection settings for one HTTP provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Overrides the public endpoint
    pub base_url: Option<String>,
    pub api_key: String,
    pub max_retries: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: String::new(),
            max_retries: 2,
        }
    }
}

impl ProviderSettings {
    fn http_config(&self, default_url: &str, key_param: &str, timeout_secs: u64) -> HttpConfig {
        HttpConfig::new(self.base_url.as_deref().unwrap_or(default_url))
            .api_key(key_param, self.api_key.as_str())
            .timeout_secs(timeout_secs)
            .max_retries(self.max_retries)
    }
}

/// Engine configuration plus provider settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub waqi: ProviderSettings,
    pub tomtom: ProviderSettings,
    /// Road point per traffic segment id
    pub segments: BTreeMap<String, SegmentPoint>,
}

impl RuntimeConfig {
    /// Read, complete from the environment and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?.with_secrets(|name| std::env::var(name).ok());
        config.validate()?;

        info!(
            "Loaded {}: {} intersections, {} corridors, tick every {}s",
            path.display(),
            config.engine.intersections.len(),
            config.engine.corridors.len(),
            config.engine.tick_interval_secs
        );
        Ok(config)
    }

    /// Parse without validating
    pub fn from_json(text: &str) -> RuntimeResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Fill empty API keys from `lookup(variable name)`
    pub fn with_secrets(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.waqi.api_key.is_empty() {
            self.waqi.api_key = lookup(WAQI_TOKEN_VAR).unwrap_or_default();
        }
        if self.tomtom.api_key.is_empty() {
            self.tomtom.api_key = lookup(TOMTOM_KEY_VAR).unwrap_or_default();
        }
        self
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        self.engine.validate()?;

        if self.waqi.api_key.is_empty() {
            return Err(RuntimeError::Config(format!(
                "WAQI token missing: set waqi.api_key or {WAQI_TOKEN_VAR}"
            )));
        }
        if self.tomtom.api_key.is_empty() {
            return Err(RuntimeError::Config(format!(
                "TomTom key missing: set tomtom.api_key or {TOMTOM_KEY_VAR}"
            )));
        }

        for intersection in &self.engine.intersections {
            if !self.segments.contains_key(&intersection.segment_id) {
                return Err(RuntimeError::Config(format!(
                    "segment {} of intersection {} has no coordinates",
                    intersection.segment_id, intersection.id
                )));
            }
        }
        Ok(())
    }

    pub fn air_quality_provider(&self) -> RuntimeResult<WaqiProvider> {
        let config = self.waqi.http_config(
            WAQI_BASE_URL,
            "token",
            self.engine.provider_timeout_secs,
        );
        Ok(WaqiProvider::with_config(config)?)
    }

    pub fn traffic_provider(&self) -> RuntimeResult<TomTomProvider> {
        let config = self.tomtom.http_config(
            TOMTOM_BASE_URL,
            "key",
            self.engine.provider_timeout_secs,
        );
        Ok(TomTomProvider::with_config(config)?.with_segments(self.segments.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecosignal_core::{EngineError, IntersectionConfig};
    use std::io::Write;

    const SHIPPED: &str = include_str!("../../config/bangalore.json");

    fn keys(name: &str) -> Option<String> {
        Some(format!("{name}-value"))
    }

    #[test]
    fn shipped_config_is_valid_once_keys_are_set() {
        let config = RuntimeConfig::from_json(SHIPPED).unwrap();
        assert!(matches!(config.validate(), Err(RuntimeError::Config(_))));

        let config = config.with_secrets(keys);
        config.validate().unwrap();
        assert_eq!(config.engine.intersections.len(), 4);
        assert_eq!(config.engine.corridor("mg-road").unwrap().name, "MG Road");
        assert_eq!(config.waqi.api_key, "ECOSIGNAL_WAQI_TOKEN-value");
        assert_eq!(config.tomtom.max_retries, 1);
    }

    #[test]
    fn keys_in_file_win_over_environment() {
        let mut config = RuntimeConfig::default();
        config.waqi.api_key = "from-file".into();
        let config = config.with_secrets(keys);
        assert_eq!(config.waqi.api_key, "from-file");
        assert_eq!(config.tomtom.api_key, "ECOSIGNAL_TOMTOM_KEY-value");
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "engine": {{
                    "tick_interval_secs": 30,
                    "provider_timeout_secs": 5,
                    "intersections": [
                        {{ "id": "A", "location_id": "delhi", "segment_id": "s1" }}
                    ]
                }},
                "waqi": {{ "api_key": "t" }},
                "tomtom": {{ "api_key": "k", "base_url": "http://localhost:9000" }},
                "segments": {{ "s1": {{ "lat": 28.61, "lon": 77.20 }} }}
            }}"#
        )
        .unwrap();

        let config = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(config.engine.tick_interval_secs, 30);
        assert_eq!(config.engine.intersections[0].queue_capacity, 100);

        let traffic = config.traffic_provider().unwrap();
        assert!(traffic.segment("s1").is_some());
        assert!(config.air_quality_provider().is_ok());
    }

    #[test]
    fn segment_without_coordinates_is_rejected() {
        let mut config = RuntimeConfig::default().with_secrets(keys);
        config.engine = config
            .engine
            .with_intersection(IntersectionConfig::new("A", "A", "delhi", "s1"));
        assert!(matches!(config.validate(), Err(RuntimeError::Config(_))));
    }

    #[test]
    fn engine_errors_surface_at_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "engine": {{ "corridors": [
                {{ "id": "c", "intersections": ["X", "Y"], "distances_m": [0, 100], "target_speed_kmh": 30 }}
            ] }} }}"#
        )
        .unwrap();

        match RuntimeConfig::load(file.path()) {
            Err(RuntimeError::Engine(EngineError::UnknownIntersection(id))) => assert_eq!(id, "X"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_base_url_fails_provider_construction() {
        let mut config = RuntimeConfig::default().with_secrets(keys);
        config.waqi.base_url = Some("api.waqi.info".into());
        assert!(matches!(
            config.air_quality_provider(),
            Err(RuntimeError::Provider(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            RuntimeConfig::load("/nonexistent/ecosignal.json"),
            Err(RuntimeError::Io(_))
        ));
    }
}
