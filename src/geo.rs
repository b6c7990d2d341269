use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_distance(self, other)
    }
}

pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric() {
        let paris = Coordinate::new(48.8566, 2.3522);
        let london = Coordinate::new(51.5074, -0.1278);
        assert_eq!(paris.distance_to(&london), london.distance_to(&paris));
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = Coordinate::new(-33.8688, 151.2093);
        assert_eq!(p.distance_to(&p), 0.0);
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = Coordinate::new(0.0, 0.0).distance_to(&Coordinate::new(0.0, 1.0));
        assert!((d - 111_320.0).abs() < 111_320.0 * 0.01, "got {}", d);
    }

    #[test]
    fn paris_to_london_is_about_344_km() {
        let d = haversine_distance(&Coordinate::new(48.8566, 2.3522), &Coordinate::new(51.5074, -0.1278));
        assert!((d - 343_500.0).abs() < 2_000.0, "got {}", d);
    }
}
