//! Runtime configuration handed to the core at construction.
//!
//! Everything the screen needs to know about its environment (search
//! endpoint, tracking accuracy, highlight radius) arrives here as plain data,
//! usually deserialized from JSON supplied by the shell.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capabilities::http::ValidatedUrl;
use crate::capabilities::location::{LocationAccuracy, LocationSettings};
use crate::error::ConfigError;
use crate::{
    APPLY_DEBOUNCE, DEFAULT_FILTER_PARAM, DEFAULT_FILTER_VALUE, DEFAULT_MAP_ZOOM,
    DEFAULT_MIN_DISTANCE_M, FETCH_TIMEOUT, FILTER_MAX, FILTER_MIN, MAX_ZOOM, MIN_ZOOM,
    SELF_RADIUS_M,
};

/// How RESULT markers are keyed in the map store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKey {
    /// Keyed by display label; items sharing a label collapse into one
    /// marker, last in array order wins.
    #[default]
    Label,
    /// Keyed by the item id.
    ItemId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    #[serde(default = "default_filter_param")]
    pub filter_param: String,
    #[serde(default = "default_filter_value")]
    pub default_filter: f64,
    #[serde(default = "default_apply_debounce_ms")]
    pub apply_debounce_ms: u64,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: Option<u64>,
    #[serde(default)]
    pub marker_key: MarkerKey,
}

fn default_filter_param() -> String {
    DEFAULT_FILTER_PARAM.to_string()
}

fn default_filter_value() -> f64 {
    DEFAULT_FILTER_VALUE
}

#[allow(clippy::cast_possible_truncation)]
fn default_apply_debounce_ms() -> u64 {
    APPLY_DEBOUNCE.as_millis() as u64
}

#[allow(clippy::cast_possible_truncation, clippy::unnecessary_wraps)]
fn default_fetch_timeout_ms() -> Option<u64> {
    Some(FETCH_TIMEOUT.as_millis() as u64)
}

/// No endpoint. Fetches fail until the shell sends a real configuration.
impl Default for SearchConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl SearchConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            filter_param: default_filter_param(),
            default_filter: default_filter_value(),
            apply_debounce_ms: default_apply_debounce_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            marker_key: MarkerKey::default(),
        }
    }

    #[must_use]
    pub fn apply_debounce(&self) -> Duration {
        Duration::from_millis(self.apply_debounce_ms)
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    pub fn endpoint_url(&self) -> Result<ValidatedUrl, ConfigError> {
        ValidatedUrl::new(&self.endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            url: self.endpoint.clone(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;
        if self.filter_param.trim().is_empty() {
            return Err(ConfigError::EmptyFilterParam);
        }
        if !self.default_filter.is_finite()
            || !(FILTER_MIN..=FILTER_MAX).contains(&self.default_filter)
        {
            return Err(ConfigError::FilterOutOfRange(self.default_filter));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub accuracy: LocationAccuracy,
    pub min_distance_m: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            accuracy: LocationAccuracy::default(),
            min_distance_m: DEFAULT_MIN_DISTANCE_M,
        }
    }
}

impl TrackingConfig {
    #[must_use]
    pub fn settings(&self) -> LocationSettings {
        LocationSettings {
            accuracy: self.accuracy,
            min_distance_m: self.min_distance_m,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_distance("tracking.min_distance_m", self.min_distance_m)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub self_radius_m: f64,
    pub default_zoom: f64,
    pub track_on_activate: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            self_radius_m: SELF_RADIUS_M,
            default_zoom: DEFAULT_MAP_ZOOM,
            track_on_activate: true,
        }
    }
}

impl MapConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_distance("map.self_radius_m", self.self_radius_m)
    }

    #[must_use]
    pub fn zoom(&self) -> f64 {
        if self.default_zoom.is_finite() {
            self.default_zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            DEFAULT_MAP_ZOOM
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub search: SearchConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub map: MapConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl AppConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            search: SearchConfig::new(endpoint),
            tracking: TrackingConfig::default(),
            map: MapConfig::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.validate()?;
        self.tracking.validate()?;
        self.map.validate()
    }
}

fn check_distance(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDistance { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_applies_defaults() {
        let config =
            AppConfig::from_json(r#"{"search":{"endpoint":"https://api.example.com/places"}}"#)
                .unwrap();
        assert_eq!(config.search.filter_param, "minProtein");
        assert!(config.search.default_filter.abs() < f64::EPSILON);
        assert_eq!(config.search.apply_debounce(), APPLY_DEBOUNCE);
        assert_eq!(config.search.fetch_timeout(), Some(FETCH_TIMEOUT));
        assert_eq!(config.search.marker_key, MarkerKey::Label);
        assert_eq!(config.tracking, TrackingConfig::default());
        assert!((config.map.self_radius_m - 250.0).abs() < f64::EPSILON);
        assert!(config.map.track_on_activate);
    }

    #[test]
    fn test_from_json_overrides() {
        let config = AppConfig::from_json(
            r#"{
                "search": {
                    "endpoint": "https://api.example.com/places",
                    "fetch_timeout_ms": null,
                    "apply_debounce_ms": 0,
                    "marker_key": "item_id"
                },
                "tracking": { "accuracy": "best", "min_distance_m": 0 },
                "map": { "track_on_activate": false }
            }"#,
        )
        .unwrap();
        assert_eq!(config.search.fetch_timeout(), None);
        assert_eq!(config.search.apply_debounce(), Duration::ZERO);
        assert_eq!(config.search.marker_key, MarkerKey::ItemId);
        assert_eq!(config.tracking.accuracy, LocationAccuracy::Best);
        assert!(!config.map.track_on_activate);
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let err = AppConfig::from_json(r#"{"search":{"endpoint":"ftp://example.com"}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_rejects_missing_endpoint() {
        let err = AppConfig::from_json(r#"{"tracking":{}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_rejects_negative_distance() {
        let mut config = AppConfig::new("https://api.example.com/places");
        config.tracking.min_distance_m = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDistance { .. })
        ));
    }

    #[test]
    fn test_rejects_filter_out_of_range() {
        let mut config = AppConfig::new("https://api.example.com/places");
        config.search.default_filter = 101.0;
        assert_eq!(config.validate(), Err(ConfigError::FilterOutOfRange(101.0)));
    }

    #[test]
    fn test_default_has_no_usable_endpoint() {
        let config = AppConfig::default();
        assert!(config.search.endpoint.is_empty());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
        assert_eq!(config.tracking, TrackingConfig::default());
    }

    #[test]
    fn test_zoom_is_clamped() {
        let map = MapConfig {
            default_zoom: 40.0,
            ..MapConfig::default()
        };
        assert!((map.zoom() - MAX_ZOOM).abs() < f64::EPSILON);
    }
}
