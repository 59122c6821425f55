//! Great-circle distance and bounding-box search windows

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in miles
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Miles per degree of latitude used by the search window
pub const MILES_PER_DEGREE: f64 = 69.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Latitude must be between -90 and 90, got {0}")]
    LatitudeOutOfRange(f64),

    #[error("Longitude must be between -180 and 180, got {0}")]
    LongitudeOutOfRange(f64),

    #[error("Radius must be a positive number of miles, got {0}")]
    InvalidRadius(f64),
}

/// A validated latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Haversine distance in miles
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();

        EARTH_RADIUS_MILES * c
    }
}

/// Distance between two optional positions; `None` when either is unknown
pub fn distance_between(a: Option<Coordinates>, b: Option<Coordinates>) -> Option<f64> {
    Some(a?.distance_to(&b?))
}

/// Axis-aligned latitude/longitude window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    /// Window of `radius / 69` degrees of latitude and
    /// `radius / (cos(lat) * 69)` degrees of longitude around `center`.
    ///
    /// The longitude window opens to the full range when it would reach
    /// across the antimeridian or when the center is close enough to a pole
    /// that the division blows up.
    pub fn around(center: Coordinates, radius_miles: f64) -> Result<Self, GeoError> {
        if !radius_miles.is_finite() || radius_miles <= 0.0 {
            return Err(GeoError::InvalidRadius(radius_miles));
        }

        let lat_delta = radius_miles / MILES_PER_DEGREE;
        let cos_lat = center.latitude.to_radians().cos();
        let lon_delta = if cos_lat > f64::EPSILON {
            radius_miles / (cos_lat * MILES_PER_DEGREE)
        } else {
            f64::INFINITY
        };

        Ok(Self::spanning(center, lat_delta, lon_delta))
    }

    /// Smallest window holding every point within `radius_miles` of
    /// `center` on the sphere.
    ///
    /// Wider than [`around`](Self::around) at high latitudes and large radii,
    /// where the flat `cos(lat)` scaling undershoots the true longitude reach
    /// of `asin(sin(d) / cos(lat))`.
    pub fn covering(center: Coordinates, radius_miles: f64) -> Result<Self, GeoError> {
        if !radius_miles.is_finite() || radius_miles <= 0.0 {
            return Err(GeoError::InvalidRadius(radius_miles));
        }

        let d = radius_miles / EARTH_RADIUS_MILES;
        let lat_delta = d.to_degrees();
        let reaches_pole = center.latitude.abs() + lat_delta >= 90.0;

        let ratio = d.sin() / center.latitude.to_radians().cos();
        let lon_delta = if reaches_pole || ratio >= 1.0 {
            f64::INFINITY
        } else {
            ratio.asin().to_degrees()
        };

        Ok(Self::spanning(center, lat_delta, lon_delta))
    }

    fn spanning(center: Coordinates, lat_delta: f64, lon_delta: f64) -> Self {
        let min_latitude = (center.latitude - lat_delta).max(-90.0);
        let max_latitude = (center.latitude + lat_delta).min(90.0);

        let (min_longitude, max_longitude) = if center.longitude - lon_delta < -180.0
            || center.longitude + lon_delta > 180.0
        {
            (-180.0, 180.0)
        } else {
            (center.longitude - lon_delta, center.longitude + lon_delta)
        };

        Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        }
    }

    pub fn contains(&self, point: &Coordinates) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&point.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&point.longitude)
    }
}
