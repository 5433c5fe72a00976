// lib.rs - shared core for the nearby-search map screen

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod geo;
pub mod map_state;
pub mod model;
pub mod tracker;
pub mod view;

use std::time::Duration;

pub use app::{App, Model};
pub use capabilities::{Capabilities, Effect};
pub use config::{AppConfig, MapConfig, MarkerKey, SearchConfig, TrackingConfig};
pub use controller::{RequestId, SearchController, SearchPhase};
pub use crux_core::{render::Render, App as CruxApp};
pub use error::{AppError, AppResult, ConfigError, CoordinateError, ErrorKind, ErrorSeverity};
pub use event::Event;
pub use geo::{haversine_distance, Geocoordinate};
pub use map_state::{
    CircleStyle, IconRef, MapCircle, MapMarker, MapSnapshot, MapStateStore, MarkerKind,
};
pub use model::{FilterState, SearchQuery, SearchResultItem};
pub use tracker::{PositionTracker, SessionId, TrackingSession};
pub use view::{CameraView, FilterView, ScreenState, StatusView, ViewModel};

/// The core as a platform shell drives it.
pub type NearbyCore = crux_core::Core<Effect, App>;

pub const SELF_MARKER_ID: &str = "me";
pub const SELF_CIRCLE_ID: &str = "me_radius";
pub const SELF_RADIUS_M: f64 = 250.0;
pub const SELF_MARKER_Z_INDEX: i32 = 2;
pub const RESULT_MARKER_Z_INDEX: i32 = 1;
pub const SELF_MARKER_TITLE: &str = "You are here";

pub const FILTER_MIN: f64 = 0.0;
pub const FILTER_MAX: f64 = 100.0;
pub const DEFAULT_FILTER_VALUE: f64 = 0.0;
pub const DEFAULT_FILTER_PARAM: &str = "minProtein";

pub const DEFAULT_MIN_DISTANCE_M: f64 = 10.0;
pub const DEFAULT_MAP_ZOOM: f64 = 14.0;
pub const MIN_ZOOM: f64 = 2.0;
pub const MAX_ZOOM: f64 = 21.0;
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub const APPLY_DEBOUNCE: Duration = Duration::from_millis(300);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch data. Please try again.";
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";
