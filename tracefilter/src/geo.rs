//! Geodesic helpers
//!
//! Great-circle distances between latitude/longitude pairs on a sphere of
//! Earth's mean radius, plus a few small conversions used by the filter rules
//! and the track aggregator.

/// Earth's mean radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Multiplier converting meters per second to kilometers per hour.
pub const MPS_TO_KMH: f64 = 3.6;

/// Formula used to compute great-circle distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceStrategy {
    /// Spherical law of cosines (default).
    #[default]
    SphericalLawOfCosines,
    /// Haversine formula, better conditioned for very short distances.
    Haversine,
}

/// Anything with a latitude/longitude position in degrees.
pub trait GeoPoint {
    /// Latitude in degrees.
    fn latitude(&self) -> f64;
    /// Longitude in degrees.
    fn longitude(&self) -> f64;
}

impl GeoPoint for (f64, f64) {
    fn latitude(&self) -> f64 {
        self.0
    }

    fn longitude(&self) -> f64 {
        self.1
    }
}

/// Distance in meters between two coordinates using the given strategy.
///
/// Always non-negative and symmetric in its arguments.
#[inline]
pub fn distance_between(
    strategy: DistanceStrategy,
    from_lat: f64,
    from_lon: f64,
    to_lat: f64,
    to_lon: f64,
) -> f64 {
    match strategy {
        DistanceStrategy::SphericalLawOfCosines => {
            spherical_law_of_cosines(from_lat, from_lon, to_lat, to_lon)
        }
        DistanceStrategy::Haversine => haversine(from_lat, from_lon, to_lat, to_lon),
    }
}

/// Distance in meters between two points using the given strategy.
#[inline]
pub fn distance<A: GeoPoint, B: GeoPoint>(strategy: DistanceStrategy, from: &A, to: &B) -> f64 {
    distance_between(
        strategy,
        from.latitude(),
        from.longitude(),
        to.latitude(),
        to.longitude(),
    )
}

/// Distance in meters between two points using the default strategy.
#[inline]
pub fn geodesic_distance<A: GeoPoint, B: GeoPoint>(from: &A, to: &B) -> f64 {
    distance(DistanceStrategy::default(), from, to)
}

/// Great-circle distance using the haversine formula.
pub fn haversine(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let d_lat = (to_lat - from_lat).to_radians();
    let d_lon = (to_lon - from_lon).to_radians();
    let from_lat = from_lat.to_radians();
    let to_lat = to_lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + (d_lon / 2.0).sin().powi(2) * from_lat.cos() * to_lat.cos();

    // a can drift a hair above 1.0 for antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c
}

/// Great-circle distance using the spherical law of cosines.
pub fn spherical_law_of_cosines(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let d_lon = (to_lon - from_lon).to_radians();
    let from_lat = from_lat.to_radians();
    let to_lat = to_lat.to_radians();

    let cos_angle = from_lat.sin() * to_lat.sin() + from_lat.cos() * to_lat.cos() * d_lon.cos();

    // Rounding can push identical points just past 1.0, which acos() turns into NaN
    cos_angle.clamp(-1.0, 1.0).acos() * EARTH_RADIUS_M
}

/// Two fixes overlap when their distance is smaller than the sum of their
/// accuracy radii.
#[inline]
pub fn are_overlapping(distance_m: f64, accuracy_a: f32, accuracy_b: f32) -> bool {
    distance_m < f64::from(accuracy_a) + f64::from(accuracy_b)
}

/// Convert meters per second to kilometers per hour.
#[inline]
pub fn mps_to_kmh(speed_mps: f64) -> f64 {
    speed_mps * MPS_TO_KMH
}

/// Slope between two altitudes over a horizontal distance.
///
/// Zero when no distance was traveled.
pub fn slope(distance_m: f64, from_alt: f64, to_alt: f64) -> f64 {
    if distance_m == 0.0 {
        0.0
    } else {
        (to_alt - from_alt) / distance_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_points_are_zero_apart() {
        let d = spherical_law_of_cosines(38.7369, -9.1427, 38.7369, -9.1427);
        assert_eq!(d, 0.0);
        assert!(!d.is_nan());

        let h = haversine(38.7369, -9.1427, 38.7369, -9.1427);
        assert_eq!(h, 0.0);
    }

    #[test]
    fn test_thousandth_of_a_degree_at_equator() {
        // 0.001° of longitude at the equator ≈ 111.19 m
        let expected = EARTH_RADIUS_M * 0.001_f64.to_radians();

        let cos = distance_between(DistanceStrategy::SphericalLawOfCosines, 0.0, 0.0, 0.0, 0.001);
        let hav = distance_between(DistanceStrategy::Haversine, 0.0, 0.0, 0.0, 0.001);

        assert!((cos - expected).abs() / expected < 0.01, "cosines: {}", cos);
        assert!((hav - expected).abs() / expected < 0.001, "haversine: {}", hav);
        assert!((cos - 111.2).abs() < 1.112);
    }

    #[test]
    fn test_lisbon_to_porto() {
        // Lisbon (38.7223, -9.1393) to Porto (41.1579, -8.6291) ≈ 274 km
        let d = haversine(38.7223, -9.1393, 41.1579, -8.6291);
        assert!((d - 274_000.0).abs() < 3_000.0, "got {}", d);

        let c = spherical_law_of_cosines(38.7223, -9.1393, 41.1579, -8.6291);
        assert!((d - c).abs() < 1.0);
    }

    #[test]
    fn test_haversine_uses_longitude_delta() {
        // Purely east-west displacement must not depend on latitude values alone
        let d = haversine(10.0, 0.0, 10.0, 1.0);
        let expected = EARTH_RADIUS_M * 1.0_f64.to_radians() * 10.0_f64.to_radians().cos();
        assert!((d - expected).abs() < 50.0, "got {}, expected {}", d, expected);
    }

    #[test]
    fn test_geo_point_tuple() {
        let a = (0.0, 0.0);
        let b = (0.0, 0.001);
        assert!((geodesic_distance(&a, &b) - 111.19).abs() < 0.5);
    }

    #[test]
    fn test_overlap_is_strict() {
        assert!(are_overlapping(9.9, 5.0, 5.0));
        assert!(!are_overlapping(10.0, 5.0, 5.0));
    }

    #[test]
    fn test_speed_conversion() {
        assert!((mps_to_kmh(10.0) - 36.0).abs() < f64::EPSILON);
        assert_eq!(mps_to_kmh(0.0), 0.0);
    }

    #[test]
    fn test_slope() {
        assert_eq!(slope(0.0, 100.0, 120.0), 0.0);
        assert!((slope(200.0, 100.0, 120.0) - 0.1).abs() < 1e-12);
        assert!((slope(200.0, 120.0, 100.0) + 0.1).abs() < 1e-12);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_distance_symmetric_and_non_negative(
                lat_a in -89.0..89.0_f64,
                lon_a in -180.0..180.0_f64,
                lat_b in -89.0..89.0_f64,
                lon_b in -180.0..180.0_f64,
            ) {
                for strategy in [DistanceStrategy::SphericalLawOfCosines, DistanceStrategy::Haversine] {
                    let ab = distance_between(strategy, lat_a, lon_a, lat_b, lon_b);
                    let ba = distance_between(strategy, lat_b, lon_b, lat_a, lon_a);

                    prop_assert!(ab >= 0.0, "negative distance {}", ab);
                    prop_assert!(!ab.is_nan());
                    prop_assert!((ab - ba).abs() < 1e-6 * ab.max(1.0));
                }
            }

            #[test]
            fn test_strategies_agree_beyond_a_kilometer(
                lat_a in -60.0..60.0_f64,
                lon_a in -170.0..170.0_f64,
                d_lat in 0.01..2.0_f64,
                d_lon in 0.01..2.0_f64,
            ) {
                let cos = spherical_law_of_cosines(lat_a, lon_a, lat_a + d_lat, lon_a + d_lon);
                let hav = haversine(lat_a, lon_a, lat_a + d_lat, lon_a + d_lon);
                prop_assert!((cos - hav).abs() / hav < 0.001, "cos {} hav {}", cos, hav);
            }
        }
    }
}
