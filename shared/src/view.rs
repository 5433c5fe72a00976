use serde::{Deserialize, Serialize};

use crate::geo::Geocoordinate;
use crate::map_state::{MapCircle, MapMarker};
use crate::{FILTER_MAX, FILTER_MIN};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CameraView {
    pub target: Option<Geocoordinate>,
    pub zoom: f64,
    /// Changes whenever the shell should move the camera, even to the same
    /// target.
    pub revision: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct StatusView {
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FilterView {
    pub pending: f64,
    pub committed: f64,
    pub min: f64,
    pub max: f64,
}

impl FilterView {
    #[must_use]
    pub const fn new(pending: f64, committed: f64) -> Self {
        Self {
            pending,
            committed,
            min: FILTER_MIN,
            max: FILTER_MAX,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScreenState {
    /// Nothing fetched yet.
    Loading,
    /// The first orchestration failed; no map is shown.
    Error { message: String, is_retryable: bool },
    Map {
        markers: Vec<MapMarker>,
        circles: Vec<MapCircle>,
        camera: CameraView,
    },
}

impl ScreenState {
    #[must_use]
    pub const fn is_map(&self) -> bool {
        matches!(self, Self::Map { .. })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub screen: ScreenState,
    pub status: StatusView,
    pub filter: FilterView,
    pub tracking_active: bool,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self {
            screen: ScreenState::Loading,
            status: StatusView::default(),
            filter: FilterView::new(FILTER_MIN, FILTER_MIN),
            tracking_active: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_state_is_tagged() {
        let json = serde_json::to_value(ScreenState::Error {
            message: "nope".into(),
            is_retryable: true,
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "nope");
    }

    #[test]
    fn test_view_model_roundtrips_through_json() {
        let view = ViewModel {
            screen: ScreenState::Map {
                markers: Vec::new(),
                circles: Vec::new(),
                camera: CameraView {
                    target: Some(Geocoordinate::new(1.0, 2.0).unwrap()),
                    zoom: 14.0,
                    revision: 3,
                },
            },
            ..ViewModel::default()
        };
        let json = serde_json::to_string(&view).unwrap();
        let back: ViewModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, view);
        assert!(back.screen.is_map());
    }
}
