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

//! Low-precision solar ephemeris.
//!
//! Computes the sun's equatorial position and Greenwich sidereal time for an
//! instant. Accuracy is a small fraction of a degree, far below what a
//! world-scale terminator overlay can show.

use chrono::{DateTime, Utc};

use crate::projection::LonLat;

/// Julian day of the J2000.0 epoch (2000-01-01T12:00:00Z).
const J2000: f64 = 2_451_545.0;

/// Julian day of the Unix epoch.
const UNIX_EPOCH_JULIAN_DAY: f64 = 2_440_587.5;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Julian day for an instant, including the fractional day.
#[must_use]
#[allow(clippy::cast_precision_loss, reason = "millisecond timestamps fit in f64 for any realistic date")]
pub fn julian_day(instant: DateTime<Utc>) -> f64 {
    instant.timestamp_millis() as f64 / MILLIS_PER_DAY + UNIX_EPOCH_JULIAN_DAY
}

/// Greenwich mean sidereal time in hours (0.0..24.0).
#[must_use]
pub fn greenwich_sidereal_hours(julian_day: f64) -> f64 {
    let d = julian_day - J2000;
    (18.697_374_558 + 24.065_709_824_419_08 * d).rem_euclid(24.0)
}

/// Obliquity of the ecliptic in degrees.
fn ecliptic_obliquity(julian_day: f64) -> f64 {
    let t = (julian_day - J2000) / 36_525.0;
    23.439_291_11
        - t * (46.836_769 / 3600.0
            - t * (0.000_183_1 / 3600.0
                + t * (0.002_003_40 / 3600.0 - t * (0.576e-6 / 3600.0 - t * 4.34e-8 / 3600.0))))
}

/// Apparent ecliptic longitude of the sun in degrees.
fn sun_ecliptic_longitude(julian_day: f64) -> f64 {
    let n = julian_day - J2000;
    let mean_longitude = (280.460 + 0.985_647_4 * n).rem_euclid(360.0);
    let mean_anomaly = (357.528 + 0.985_600_3 * n).rem_euclid(360.0).to_radians();
    mean_longitude + 1.915 * mean_anomaly.sin() + 0.020 * (2.0 * mean_anomaly).sin()
}

/// Position of the sun at a given instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    /// Right ascension in degrees (-180.0..=180.0).
    pub right_ascension: f64,
    /// Declination in degrees.
    pub declination: f64,
    /// Greenwich mean sidereal time in hours.
    pub sidereal_hours: f64,
}

impl SunPosition {
    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        let jd = julian_day(instant);
        let lambda = sun_ecliptic_longitude(jd).to_radians();
        let epsilon = ecliptic_obliquity(jd).to_radians();

        let right_ascension = (epsilon.cos() * lambda.sin())
            .atan2(lambda.cos())
            .to_degrees();
        let declination = (epsilon.sin() * lambda.sin()).asin().to_degrees();

        Self {
            right_ascension,
            declination,
            sidereal_hours: greenwich_sidereal_hours(jd),
        }
    }

    /// Local hour angle of the sun at a longitude, in degrees.
    ///
    /// Zero on the subsolar meridian, growing westward.
    #[must_use]
    pub fn hour_angle(&self, lon: f64) -> f64 {
        self.sidereal_hours * 15.0 + lon - self.right_ascension
    }

    /// The point on Earth where the sun is at the zenith.
    #[must_use]
    pub fn subsolar_point(&self) -> LonLat {
        let lon = (self.right_ascension - self.sidereal_hours * 15.0 + 180.0).rem_euclid(360.0) - 180.0;
        LonLat::new(lon, self.declination)
    }

    /// Geometric elevation of the sun above the horizon at a point, in degrees.
    #[must_use]
    pub fn elevation_at(&self, point: LonLat) -> f64 {
        let lat = point.lat.to_radians();
        let dec = self.declination.to_radians();
        let ha = self.hour_angle(point.lon).to_radians();
        (lat.sin() * dec.sin() + lat.cos() * dec.cos() * ha.cos())
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_julian_day_at_j2000() {
        assert!((julian_day(utc(2000, 1, 1, 12, 0)) - J2000).abs() < 1e-9);
    }

    #[test]
    fn test_sidereal_time_at_j2000() {
        assert!((greenwich_sidereal_hours(J2000) - 18.697_374_558).abs() < 1e-9);
    }

    #[test]
    fn test_declination_at_march_equinox() {
        let sun = SunPosition::at(utc(2024, 3, 20, 3, 6));
        assert!(sun.declination.abs() < 0.05, "got {}", sun.declination);
    }

    #[test]
    fn test_declination_at_solstices() {
        let june = SunPosition::at(utc(2024, 6, 20, 20, 51));
        let december = SunPosition::at(utc(2024, 12, 21, 9, 21));
        assert!((june.declination - 23.44).abs() < 0.05, "got {}", june.declination);
        assert!((december.declination + 23.44).abs() < 0.05, "got {}", december.declination);
    }

    #[test]
    fn test_subsolar_point_near_greenwich_at_noon() {
        // Equation of time keeps the sun within a couple of degrees of the meridian
        let sun = SunPosition::at(utc(2024, 6, 20, 12, 0));
        let point = sun.subsolar_point();
        assert!(point.lon.abs() < 2.0, "got {}", point.lon);
        assert!((point.lat - 23.44).abs() < 0.1);
    }

    #[test]
    fn test_elevation_at_subsolar_point_is_zenith() {
        let sun = SunPosition::at(utc(2024, 9, 1, 18, 30));
        let elevation = sun.elevation_at(sun.subsolar_point());
        assert!((elevation - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_elevation_at_antipode_is_nadir() {
        let sun = SunPosition::at(utc(2024, 9, 1, 18, 30));
        let sub = sun.subsolar_point();
        let antipode = LonLat::new(sub.lon + 180.0, -sub.lat);
        assert!((sun.elevation_at(antipode) + 90.0).abs() < 1e-4);
    }
}
