use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::shift::GeofenceCircle;

/// Mean earth radius used by the haversine formula (spherical approximation).
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[schema(example = 12.9716)]
    pub latitude: f64,
    #[schema(example = 77.5946)]
    pub longitude: f64,
}

/// Outcome of testing a point against one or more allowed circles.
#[derive(Debug, Clone, Copy)]
pub struct GeofenceCheck {
    pub within_fence: bool,
    /// Distance to the nearest circle center, in meters.
    pub distance_meters: f64,
}

/// Great-circle distance between two coordinates in meters.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // clamp guards against rounding pushing sqrt input past 1 for antipodes
    let c = 2.0 * a.sqrt().clamp(0.0, 1.0).asin();

    EARTH_RADIUS_METERS * c
}

/// Tests a point against a single allowed circle.
pub fn check_circle(point: GeoPoint, circle: &GeofenceCircle) -> GeofenceCheck {
    let distance = distance_meters(
        point.latitude,
        point.longitude,
        circle.latitude,
        circle.longitude,
    );
    GeofenceCheck {
        within_fence: distance <= circle.radius_meters,
        distance_meters: distance,
    }
}

/// Tests a point against every allowed circle; the point is accepted if it
/// falls inside ANY of them. An empty list means no geofence is required and
/// every location is accepted.
pub fn check_circles(point: GeoPoint, circles: &[GeofenceCircle]) -> GeofenceCheck {
    if circles.is_empty() {
        return GeofenceCheck {
            within_fence: true,
            distance_meters: 0.0,
        };
    }

    let mut nearest = f64::INFINITY;
    for circle in circles {
        let check = check_circle(point, circle);
        if check.within_fence {
            return check;
        }
        nearest = nearest.min(check.distance_meters);
    }

    GeofenceCheck {
        within_fence: false,
        distance_meters: nearest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(lat: f64, lon: f64, radius: f64) -> GeofenceCircle {
        GeofenceCircle {
            latitude: lat,
            longitude: lon,
            radius_meters: radius,
        }
    }

    #[test]
    fn zero_distance_for_identical_points() {
        assert_eq!(distance_meters(12.9716, 77.5946, 12.9716, 77.5946), 0.0);
    }

    #[test]
    fn known_distance_between_cities() {
        // Bangalore -> Chennai is roughly 290 km
        let d = distance_meters(12.9716, 77.5946, 13.0827, 80.2707);
        assert!((d - 290_000.0).abs() < 5_000.0, "got {d}");
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let d = distance_meters(0.0, 0.0, 0.0, 180.0);
        let half = std::f64::consts::PI * EARTH_RADIUS_METERS;
        assert!((d - half).abs() < 1.0, "got {d}");
    }

    #[test]
    fn zero_distance_is_inside_any_positive_radius() {
        let check = check_circle(
            GeoPoint { latitude: 12.9716, longitude: 77.5946 },
            &circle(12.9716, 77.5946, 1.0),
        );
        assert!(check.within_fence);
        assert_eq!(check.distance_meters, 0.0);
    }

    #[test]
    fn empty_circle_list_accepts_everything() {
        let check = check_circles(GeoPoint { latitude: 55.0, longitude: -3.0 }, &[]);
        assert!(check.within_fence);
    }

    #[test]
    fn accepted_when_inside_any_of_several_circles() {
        let circles = [
            circle(12.9716, 77.5946, 100.0),
            circle(12.9352, 77.6245, 150.0),
        ];
        // ~60 m east of the second center
        let point = GeoPoint { latitude: 12.9352, longitude: 77.62505 };
        let check = check_circles(point, &circles);
        assert!(check.within_fence);
        assert!(check.distance_meters <= 150.0);
    }

    #[test]
    fn rejected_outside_both_offices_reports_nearest_distance() {
        // Office A and office B from two real campus coordinates; the probe
        // point is several kilometers from either.
        let circles = [
            circle(12.9716, 77.5946, 100.0),
            circle(12.9352, 77.6245, 150.0),
        ];
        let point = GeoPoint { latitude: 13.0100, longitude: 77.7000 };
        let check = check_circles(point, &circles);
        assert!(!check.within_fence);
        assert!(check.distance_meters > 5_000.0, "got {}", check.distance_meters);

        let to_a = distance_meters(13.0100, 77.7000, 12.9716, 77.5946);
        let to_b = distance_meters(13.0100, 77.7000, 12.9352, 77.6245);
        assert_eq!(check.distance_meters, to_a.min(to_b));
    }

    #[test]
    fn boundary_point_is_inside() {
        let c = circle(0.0, 0.0, 200.0);
        // ~111 m per 0.001 degree of latitude at the equator
        let point = GeoPoint { latitude: 0.001, longitude: 0.0 };
        let check = check_circle(point, &c);
        assert!(check.within_fence);
        assert!((check.distance_meters - 111.0).abs() < 5.0);
    }
}
