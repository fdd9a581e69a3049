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

//! Hours-ahead time offsets and their clock labels.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use log::warn;

/// Hour:minute, no leading zero on the hour.
pub const DEFAULT_CLOCK_FORMAT: &str = "%-H:%M";

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// The current instant moved by `hours` (fractional and negative allowed).
#[must_use]
pub fn time_ahead(hours: f64) -> DateTime<Utc> {
    time_ahead_from(Utc::now(), hours)
}

/// `base` moved by `hours`, to millisecond precision.
///
/// Offsets that cannot be represented leave `base` unchanged.
#[must_use]
#[allow(clippy::cast_possible_truncation, reason = "range is checked before the cast")]
pub fn time_ahead_from<Tz: TimeZone>(base: DateTime<Tz>, hours: f64) -> DateTime<Tz> {
    let millis = (hours * MILLIS_PER_HOUR).round();
    #[allow(clippy::cast_precision_loss, reason = "bounds comparison only")]
    let in_range = millis.is_finite() && millis.abs() < i64::MAX as f64;
    if !in_range {
        warn!("Ignoring unrepresentable time offset: {hours} hours");
        return base;
    }

    match TimeDelta::try_milliseconds(millis as i64) {
        Some(delta) => base.clone().checked_add_signed(delta).unwrap_or_else(|| {
            warn!("Time offset of {hours} hours overflows the calendar");
            base
        }),
        None => {
            warn!("Ignoring unrepresentable time offset: {hours} hours");
            base
        }
    }
}

/// Local clock label for now + `hours`.
#[must_use]
pub fn format_thumb_label(hours: f64, format: &str) -> String {
    format_thumb_label_at(Local::now(), hours, format)
}

/// Whether chrono can render `format` without error.
#[must_use]
pub fn is_valid_clock_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Clock label for `now` + `hours`, rendered in `now`'s time zone.
///
/// An unusable `format` falls back to [`DEFAULT_CLOCK_FORMAT`].
#[must_use]
pub fn format_thumb_label_at<Tz>(now: DateTime<Tz>, hours: f64, format: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let format = if is_valid_clock_format(format) {
        format
    } else {
        warn!("Invalid clock format {format:?}, using {DEFAULT_CLOCK_FORMAT:?}");
        DEFAULT_CLOCK_FORMAT
    };
    time_ahead_from(now, hours).format(format).to_string()
}
