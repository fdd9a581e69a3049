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

//! Night-side geometry.
//!
//! The terminator is sampled as one latitude per longitude step; the night
//! region is the area between that line and the pole the sun cannot see.

use chrono::{DateTime, Utc};

use crate::projection::LonLat;
use crate::solar::SunPosition;

/// Default longitude step between terminator samples, in degrees.
pub const DEFAULT_RESOLUTION_DEGREES: f64 = 1.0;

/// Smallest usable |tan(declination)|; keeps equinox terminators finite.
const MIN_DECLINATION_TANGENT: f64 = 1e-9;

/// Source of night polygons for an instant.
///
/// The map view only ever asks this trait for geometry, so tests can supply
/// fixed shapes without touching the ephemeris.
pub trait NightSource {
    fn night_polygon(&self, instant: DateTime<Utc>) -> NightPolygon;
}

/// Night polygon computed from the solar ephemeris.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarTerminator {
    resolution_degrees: f64,
}

impl Default for SolarTerminator {
    fn default() -> Self {
        Self {
            resolution_degrees: DEFAULT_RESOLUTION_DEGREES,
        }
    }
}

impl SolarTerminator {
    /// Create a terminator source sampling every `resolution_degrees` of longitude.
    ///
    /// Non-positive or non-finite steps fall back to the default resolution.
    #[must_use]
    pub fn new(resolution_degrees: f64) -> Self {
        if resolution_degrees.is_finite() && resolution_degrees > 0.0 {
            Self {
                resolution_degrees: resolution_degrees.min(90.0),
            }
        } else {
            Self::default()
        }
    }

    #[must_use]
    pub fn resolution_degrees(&self) -> f64 {
        self.resolution_degrees
    }
}

impl NightSource for SolarTerminator {
    fn night_polygon(&self, instant: DateTime<Utc>) -> NightPolygon {
        NightPolygon::from_sun(instant, &SunPosition::at(instant), self.resolution_degrees)
    }
}

/// The night side of the Earth at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct NightPolygon {
    instant: DateTime<Utc>,
    terminator: Vec<LonLat>,
    dark_pole: f64,
}

impl NightPolygon {
    /// Build a polygon from explicit terminator samples ordered west to east.
    #[must_use]
    pub fn new(instant: DateTime<Utc>, terminator: Vec<LonLat>, dark_pole: f64) -> Self {
        Self {
            instant,
            terminator,
            dark_pole,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "step count is a small positive integer"
    )]
    fn from_sun(instant: DateTime<Utc>, sun: &SunPosition, resolution: f64) -> Self {
        let mut tan_dec = sun.declination.to_radians().tan();
        if tan_dec.abs() < MIN_DECLINATION_TANGENT {
            tan_dec = MIN_DECLINATION_TANGENT.copysign(tan_dec);
        }

        let steps = (360.0 / resolution).ceil() as usize;
        let terminator = (0..=steps)
            .map(|i| {
                #[allow(clippy::cast_precision_loss, reason = "step index is small")]
                let lon = (-180.0 + i as f64 * resolution).min(180.0);
                let ha = sun.hour_angle(lon).to_radians();
                let lat = (-ha.cos() / tan_dec).atan().to_degrees();
                LonLat::new(lon, lat)
            })
            .collect();

        // The pole tilted away from the sun is dark. Taken from the clamped
        // tangent so the pole and the sample latitudes agree at the equinox.
        let dark_pole = if tan_dec < 0.0 { 90.0 } else { -90.0 };

        Self {
            instant,
            terminator,
            dark_pole,
        }
    }

    /// Instant this polygon was computed for.
    #[must_use]
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    /// Terminator samples, west to east.
    #[must_use]
    pub fn terminator(&self) -> &[LonLat] {
        &self.terminator
    }

    /// Latitude of the pole enclosed by the night region (+90 or -90).
    #[must_use]
    pub fn dark_pole(&self) -> f64 {
        self.dark_pole
    }

    /// Closed outer ring of the night region.
    #[must_use]
    pub fn ring(&self) -> Vec<LonLat> {
        let mut ring = Vec::with_capacity(self.terminator.len() + 3);
        ring.push(LonLat::new(-180.0, self.dark_pole));
        ring.extend_from_slice(&self.terminator);
        ring.push(LonLat::new(180.0, self.dark_pole));
        ring.push(LonLat::new(-180.0, self.dark_pole));
        ring
    }

    /// Terminator latitude at a longitude, interpolated between samples.
    #[must_use]
    pub fn terminator_latitude(&self, lon: f64) -> Option<f64> {
        let lon = (lon + 180.0).rem_euclid(360.0) - 180.0;
        let window = self
            .terminator
            .windows(2)
            .find(|pair| lon >= pair[0].lon && lon <= pair[1].lon)?;
        let (a, b) = (window[0], window[1]);
        let span = b.lon - a.lon;
        if span <= 0.0 {
            return Some(a.lat);
        }
        let t = (lon - a.lon) / span;
        Some(a.lat + (b.lat - a.lat) * t)
    }

    /// Whether a point lies on the night side.
    #[must_use]
    pub fn covers(&self, point: LonLat) -> bool {
        match self.terminator_latitude(point.lon) {
            Some(boundary) if self.dark_pole < 0.0 => point.lat < boundary,
            Some(boundary) => point.lat > boundary,
            None => false,
        }
    }
}
