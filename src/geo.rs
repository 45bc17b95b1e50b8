//! Great-circle geometry.
//!
//! [`Coordinate`] is the only validated position type in the crate; every
//! value that reaches the state machine has passed [`Coordinate::new`].
//! [`distance_meters`] itself performs no validation and has no failure
//! mode for finite input.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;

/// Mean Earth radius used by the haversine formula (metres).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ---------------------------------------------------------------------------
// Coordinate
// ---------------------------------------------------------------------------

/// A WGS-84 position in decimal degrees.
///
/// Latitude is in `[-90, 90]`, longitude in `[-180, 180]`.  Fields are
/// private so the range invariant cannot be bypassed after construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Validate and build a coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange);
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange);
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Unvalidated position as produced by a location provider.
///
/// Sources hand these to the engine; conversion into [`Coordinate`] is the
/// boundary check for malformed samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl RawCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(c: Coordinate) -> Self {
        Self {
            latitude: c.latitude,
            longitude: c.longitude,
        }
    }
}

// ---------------------------------------------------------------------------
// Haversine
// ---------------------------------------------------------------------------

/// Great-circle distance between `a` and `b` in metres (haversine).
///
/// Always `>= 0` and symmetric up to rounding.  The haversine term is
/// clamped to `[0, 1]` so near-identical and near-antipodal pairs never take
/// the square root of a slightly negative number.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    haversine(a.latitude, a.longitude, b.latitude, b.longitude)
}

fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Address label used when reverse geocoding is unavailable: `"lat, lon"`
/// with four decimals.
pub fn placeholder_address(c: Coordinate) -> String {
    format!("{:.4}, {:.4}", c.latitude, c.longitude)
}
