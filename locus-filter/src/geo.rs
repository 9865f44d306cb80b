//! Spherical earth helpers.

/// Mean earth radius in meters (IUGG)
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Haversine distance between two latitude/longitude pairs, in meters.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Clamp guards asin against rounding slightly above 1.0 for antipodal points
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Point reached by travelling `distance_m` meters north of the given latitude.
///
/// Handy for building fixes at a known separation.
pub fn offset_north(lat: f64, distance_m: f64) -> f64 {
    lat + (distance_m / EARTH_RADIUS_M).to_degrees()
}
