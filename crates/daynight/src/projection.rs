// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Geographic coordinates and the Web Mercator projection.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Largest latitude representable in Web Mercator (the square world).
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Equatorial radius used by EPSG:3857, in meters.
const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    /// Longitude in degrees, positive east.
    pub lon: f64,
    /// Latitude in degrees, positive north.
    pub lat: f64,
}

impl LonLat {
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// True when both components are finite and within the valid degree range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// Web Mercator projection utilities
#[derive(Debug, Clone, Copy)]
pub struct WebMercator;

impl WebMercator {
    /// Project to EPSG:3857 meters.
    #[must_use]
    pub fn to_meters(point: LonLat) -> (f64, f64) {
        let lat = point.lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
        let x = EARTH_RADIUS_METERS * point.lon.to_radians();
        let y = EARTH_RADIUS_METERS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
        (x, y)
    }

    /// Project to normalised world coordinates: x and y in 0.0..=1.0, origin top-left.
    ///
    /// Multiply by `256 * 2^zoom` to get pixel coordinates at a zoom level.
    #[must_use]
    pub fn to_world(point: LonLat) -> (f64, f64) {
        let lat_rad = point
            .lat
            .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
            .to_radians();
        let x = (point.lon + 180.0) / 360.0;
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;
        (x, y)
    }

    /// Inverse of [`WebMercator::to_world`].
    #[must_use]
    pub fn from_world(x: f64, y: f64) -> LonLat {
        let lon = x * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
        LonLat { lon, lat }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_projects_to_zero_meters() {
        let (x, y) = WebMercator::to_meters(LonLat::new(0.0, 0.0));
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_antimeridian_meters() {
        let (x, _) = WebMercator::to_meters(LonLat::new(180.0, 0.0));
        assert!((x - 20_037_508.342_789_244).abs() < 1e-3);
    }

    #[test]
    fn test_initial_center_meters() {
        // Center of the contiguous United States
        let (x, y) = WebMercator::to_meters(LonLat::new(-101.320_426, 42.041_532));
        assert!((x - -11_278_938.229).abs() < 0.01);
        assert!((y - 5_167_202.768).abs() < 0.01);
    }

    #[test]
    fn test_world_round_trip() {
        let point = LonLat::new(139.69, 35.68);
        let (x, y) = WebMercator::to_world(point);
        let back = WebMercator::from_world(x, y);
        assert!((back.lon - point.lon).abs() < 1e-9);
        assert!((back.lat - point.lat).abs() < 1e-9);
    }

    #[test]
    fn test_world_clamps_poles() {
        let (_, top) = WebMercator::to_world(LonLat::new(0.0, 90.0));
        let (_, bottom) = WebMercator::to_world(LonLat::new(0.0, -90.0));
        assert!(top.abs() < 1e-9);
        assert!((bottom - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_lonlat_validity() {
        assert!(LonLat::new(-101.3, 42.0).is_valid());
        assert!(!LonLat::new(181.0, 0.0).is_valid());
        assert!(!LonLat::new(0.0, f64::NAN).is_valid());
    }
}
