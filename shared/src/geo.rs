use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;
use crate::EARTH_RADIUS_M;

/// A validated WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Geocoordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Geocoordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lng)
    }
}

impl Geocoordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(CoordinateError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lng(self) -> f64 {
        self.lng
    }

    #[must_use]
    pub const fn as_tuple(self) -> (f64, f64) {
        (self.lat, self.lng)
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        haversine_distance(self, other)
    }
}

impl TryFrom<(f64, f64)> for Geocoordinate {
    type Error = CoordinateError;

    fn try_from((lat, lng): (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(lat, lng)
    }
}

impl std::fmt::Display for Geocoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Great-circle distance in meters on a spherical Earth.
///
/// Uses the `atan2` form of the haversine formula, which stays accurate for
/// both tiny and near-antipodal separations.
#[must_use]
pub fn haversine_distance(from: Geocoordinate, to: Geocoordinate) -> f64 {
    let half_chord_sq = half_chord_squared(from, to);
    let central_angle = 2.0 * half_chord_sq.sqrt().atan2((1.0 - half_chord_sq).sqrt());
    EARTH_RADIUS_M * central_angle
}

/// Square of half the chord length between two points on the unit sphere.
fn half_chord_squared(from: Geocoordinate, to: Geocoordinate) -> f64 {
    let (phi1, phi2) = (from.lat.to_radians(), to.lat.to_radians());
    let sin_dphi = ((phi2 - phi1) / 2.0).sin();
    let sin_dlambda = ((to.lng - from.lng).to_radians() / 2.0).sin();
    let h = sin_dphi * sin_dphi + phi1.cos() * phi2.cos() * sin_dlambda * sin_dlambda;
    // Rounding can push h a hair outside [0, 1] for antipodes.
    h.clamp(0.0, 1.0)
}
