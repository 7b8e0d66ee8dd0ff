use std::fmt;

/// Earth's radius in meters.
pub const EARTH_RADIUS: f64 = 6371000.0;

/// A latitude/longitude pair in decimal degrees.
///
/// Range checks belong to whoever produces the coordinate; see
/// [`GeoCoordinate::is_valid`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}°, {:.6}°)", self.latitude, self.longitude)
    }
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180].
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Initial great-circle bearing from this coordinate to `other`.
    /// Returns degrees in [0, 360), where 0 is North.
    pub fn bearing_to(&self, other: &GeoCoordinate) -> f64 {
        let lat_from = self.latitude.to_radians();
        let lat_to = other.latitude.to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let y = delta_lon.sin() * lat_to.cos();
        let x = lat_from.cos() * lat_to.sin() - lat_from.sin() * lat_to.cos() * delta_lon.cos();

        let bearing = y.atan2(x).to_degrees();

        // atan2 yields (-180, 180]; rem_euclid can round up to exactly 360
        let normalized = bearing.rem_euclid(360.0);
        if normalized >= 360.0 { 0.0 } else { normalized }
    }

    /// Haversine great-circle distance to `other`, in meters.
    ///
    /// Always finite and within `[0, π·R]` for valid coordinates.
    pub fn distance_to(&self, other: &GeoCoordinate) -> f64 {
        let (phi_a, phi_b) = (self.latitude.to_radians(), other.latitude.to_radians());
        let half_dphi = (phi_b - phi_a) / 2.0;
        let half_dlambda = (other.longitude - self.longitude).to_radians() / 2.0;

        let haversine = half_dphi.sin().powi(2)
            + phi_a.cos() * phi_b.cos() * half_dlambda.sin().powi(2);
        // rounding can push near-antipodal pairs just past 1
        let haversine = haversine.clamp(0.0, 1.0);

        2.0 * EARTH_RADIUS * haversine.sqrt().asin()
    }

    /// Destination reached by travelling `distance` meters from here along
    /// the great circle starting at `bearing` degrees.
    pub fn project(&self, bearing: f64, distance: f64) -> GeoCoordinate {
        let phi = self.latitude.to_radians();
        let theta = bearing.to_radians();
        let delta = distance / EARTH_RADIUS;
        let (sin_delta, cos_delta) = delta.sin_cos();

        let sin_phi_to = phi.sin() * cos_delta + phi.cos() * sin_delta * theta.cos();
        let phi_to = sin_phi_to.clamp(-1.0, 1.0).asin();
        let dlambda = (theta.sin() * sin_delta * phi.cos()).atan2(cos_delta - phi.sin() * sin_phi_to);

        let longitude = (self.longitude + dlambda.to_degrees() + 180.0).rem_euclid(360.0) - 180.0;
        GeoCoordinate::new(phi_to.to_degrees(), longitude)
    }
}

/// Haversine distance in meters between `a` and `b`.
pub fn distance(a: &GeoCoordinate, b: &GeoCoordinate) -> f64 {
    a.distance_to(b)
}

/// Initial bearing in degrees [0, 360) from `a` towards `b`.
pub fn bearing(a: &GeoCoordinate, b: &GeoCoordinate) -> f64 {
    a.bearing_to(b)
}
