use serde::{Deserialize, Serialize};

use nearcast_shared::errors::{AppError, ErrorCode};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters spanned by one degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// A validated WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AppError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if !valid {
            return Err(AppError::with_details(
                ErrorCode::InvalidCoordinates,
                "coordinates out of range",
                serde_json::json!({ "latitude": latitude, "longitude": longitude }),
            ));
        }

        Ok(Self { latitude, longitude })
    }

    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        distance_meters(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Great-circle distance in meters between two points (haversine).
///
/// Inputs are expected in range; out-of-range values give unspecified results.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` marginally past 1 for antipodal points.
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().atan2((1.0 - a).clamp(0.0, 1.0).sqrt());

    EARTH_RADIUS_M * c
}

/// Axis-aligned lat/lon box used to narrow a store scan before exact filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Conservative box around `center` containing every point within `radius_m`.
///
/// Returns `None` when the box would touch a pole or cross the antimeridian;
/// callers then scan without a spatial prefilter.
pub fn bounding_box(center: Coordinates, radius_m: f64) -> Option<BoundingBox> {
    // 10% slack covers the spherical vs. flat-degree approximation.
    let padded = radius_m * 1.1;
    let d_lat = padded / METERS_PER_DEGREE;
    let min_lat = center.latitude - d_lat;
    let max_lat = center.latitude + d_lat;
    if min_lat <= -90.0 || max_lat >= 90.0 {
        return None;
    }

    let widest_lat = center.latitude.abs() + d_lat;
    let d_lon = padded / (METERS_PER_DEGREE * widest_lat.to_radians().cos());
    let min_lon = center.longitude - d_lon;
    let max_lon = center.longitude + d_lon;
    if min_lon < -180.0 || max_lon > 180.0 {
        return None;
    }

    Some(BoundingBox { min_lat, max_lat, min_lon, max_lon })
}

impl BoundingBox {
    pub fn contains(&self, point: &Coordinates) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude)
            && (self.min_lon..=self.max_lon).contains(&point.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        for (lat, lon) in [(0.0, 0.0), (48.8566, 2.3522), (-33.8688, 151.2093), (90.0, 0.0)] {
            assert_eq!(distance_meters(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            ((40.7128, -74.0060), (34.0522, -118.2437)),
            ((51.5074, -0.1278), (-33.8688, 151.2093)),
            ((0.0, 179.9), (0.0, -179.9)),
        ];
        for ((a_lat, a_lon), (b_lat, b_lon)) in pairs {
            let ab = distance_meters(a_lat, a_lon, b_lat, b_lon);
            let ba = distance_meters(b_lat, b_lon, a_lat, a_lon);
            assert!((ab - ba).abs() < 1e-6, "{ab} != {ba}");
        }
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance_meters(10.0, 20.0, 11.0, 20.0);
        let expected = 111_320.0;
        assert!((d - expected).abs() / expected < 0.01, "got {d}");
    }

    #[test]
    fn antipodal_points_do_not_nan() {
        let d = distance_meters(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn bounding_box_contains_points_at_radius() {
        let center = Coordinates::new(59.33, 18.06).unwrap();
        let bbox = bounding_box(center, 2_000.0).unwrap();

        // Due north/east at exactly the radius.
        let north = Coordinates::new(59.33 + 2_000.0 / 111_195.0, 18.06).unwrap();
        let east_deg = 2_000.0 / (111_195.0 * 59.33_f64.to_radians().cos());
        let east = Coordinates::new(59.33, 18.06 + east_deg).unwrap();

        assert!(bbox.contains(&north));
        assert!(bbox.contains(&east));
        assert!(!bbox.contains(&Coordinates::new(60.0, 18.06).unwrap()));
    }

    #[test]
    fn bounding_box_gives_up_near_poles_and_antimeridian() {
        assert!(bounding_box(Coordinates::new(89.999, 0.0).unwrap(), 1_000.0).is_none());
        assert!(bounding_box(Coordinates::new(0.0, 179.999).unwrap(), 1_000.0).is_none());
    }
}
