//! Great-circle filtering of reports around a point.

use serde::Serialize;

use super::domain::Report;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated WGS-84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    lat: f64,
    lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeometryError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeometryError::LatitudeOutOfRange(lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(GeometryError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// A query result annotated with its distance from the origin. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyReport {
    #[serde(flatten)]
    pub report: Report,
    pub distance_in_km: f64,
}

/// Reports within `radius_km` of `origin`, nearest first.
///
/// Candidates without usable coordinates are skipped. Ties are ordered by report id so the
/// output is stable across calls.
pub fn nearby<I>(
    origin: Coordinates,
    radius_km: f64,
    candidates: I,
) -> Result<Vec<NearbyReport>, GeometryError>
where
    I: IntoIterator<Item = Report>,
{
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(GeometryError::InvalidRadius(radius_km));
    }

    let mut results: Vec<NearbyReport> = candidates
        .into_iter()
        .filter_map(|report| {
            let position = report.coordinates()?;
            let distance_in_km = haversine_km(origin, position);
            (distance_in_km <= radius_km).then_some(NearbyReport {
                report,
                distance_in_km,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        a.distance_in_km
            .total_cmp(&b.distance_in_km)
            .then_with(|| a.report.id.cmp(&b.report.id))
    });

    Ok(results)
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("radius must be a positive number of kilometres, got {0}")]
    InvalidRadius(f64),
}
