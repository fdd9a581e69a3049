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

//! Map view lifecycle.
//!
//! A [`PendingMapView`] holds configuration until a screen region exists.
//! [`PendingMapView::attach`] turns it into a [`MapView`], which owns the
//! map surface and is the only type that can refresh the overlay.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio_util::sync::CancellationToken;
use thiserror::Error;

use crate::offset::{self, DEFAULT_CLOCK_FORMAT};
use crate::projection::LonLat;
use crate::surface::{
    BaseLayer, Control, DayNightOverlay, MapSurface, OverlayStyle, Viewport, DEFAULT_TILE_URL,
    MAX_ZOOM, MIN_ZOOM,
};
use crate::terminator::{NightSource, SolarTerminator};
use crate::ticker::{RefreshTicker, MAX_REFRESH_PERIOD};

/// Errors in a [`MapViewConfig`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid map center: lon {lon}, lat {lat}")]
    InvalidCenter { lon: f64, lat: f64 },

    #[error("zoom {0} is outside {min}..={max}", min = MIN_ZOOM, max = MAX_ZOOM)]
    InvalidZoom(f64),

    #[error("refresh period must be greater than zero")]
    ZeroRefreshPeriod,

    #[error("refresh period of {0:?} exceeds the {max:?} maximum", max = MAX_REFRESH_PERIOD)]
    RefreshPeriodTooLong(Duration),

    #[error("clock format {0:?} is not a valid strftime pattern")]
    InvalidClockFormat(String),

    #[error("invalid time offset range: {min}..={max} hours (step {step})")]
    InvalidOffsetRange { min: f64, max: f64, step: f64 },

    #[error("tile URL template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),
}

/// Errors when attaching a view to the screen.
#[derive(Debug, Error, PartialEq)]
pub enum AttachError {
    #[error("screen region {width}x{height} has no drawable area")]
    EmptyRegion { width: f32, height: f32 },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Settings for a map view.
#[derive(Debug, Clone, PartialEq)]
pub struct MapViewConfig {
    /// Base imagery URL template.
    pub tile_url: String,
    /// Initial viewport center.
    pub center: LonLat,
    /// Initial zoom level.
    pub zoom: f64,
    /// Controls to show. Empty unless the caller opts in.
    pub controls: Vec<Control>,
    pub overlay_style: OverlayStyle,
    /// Interval between live overlay refreshes.
    pub refresh_period: Duration,
    /// Lower bound of the time offset control, in hours.
    pub offset_min_hours: f64,
    /// Upper bound of the time offset control, in hours.
    pub offset_max_hours: f64,
    /// Slider step, in hours.
    pub offset_step_hours: f64,
    /// `strftime` format for the offset label.
    pub clock_format: String,
}

impl Default for MapViewConfig {
    fn default() -> Self {
        Self {
            tile_url: DEFAULT_TILE_URL.to_string(),
            center: LonLat::new(-101.320_426, 42.041_532),
            zoom: 4.0,
            controls: Vec::new(),
            overlay_style: OverlayStyle::default(),
            refresh_period: Duration::from_secs(30),
            offset_min_hours: -24.0,
            offset_max_hours: 24.0,
            offset_step_hours: 0.25,
            clock_format: DEFAULT_CLOCK_FORMAT.to_string(),
        }
    }
}

impl MapViewConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.center.is_valid() {
            return Err(ConfigError::InvalidCenter {
                lon: self.center.lon,
                lat: self.center.lat,
            });
        }
        if !self.zoom.is_finite() || !(MIN_ZOOM..=MAX_ZOOM).contains(&self.zoom) {
            return Err(ConfigError::InvalidZoom(self.zoom));
        }
        if self.refresh_period.is_zero() {
            return Err(ConfigError::ZeroRefreshPeriod);
        }
        if self.refresh_period > MAX_REFRESH_PERIOD {
            return Err(ConfigError::RefreshPeriodTooLong(self.refresh_period));
        }
        let (min, max, step) = (self.offset_min_hours, self.offset_max_hours, self.offset_step_hours);
        if !(min.is_finite() && max.is_finite() && step.is_finite()) || min > max || step < 0.0 {
            return Err(ConfigError::InvalidOffsetRange { min, max, step });
        }
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !self.tile_url.contains(placeholder) {
                return Err(ConfigError::MissingPlaceholder(placeholder));
            }
        }
        if !offset::is_valid_clock_format(&self.clock_format) {
            return Err(ConfigError::InvalidClockFormat(self.clock_format.clone()));
        }
        Ok(())
    }
}

/// Size of the screen area the map is drawn into, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRegion {
    pub width: f32,
    pub height: f32,
}

impl ScreenRegion {
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

/// Which instant the overlay is tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshMode {
    /// Follow the wall clock, refreshing on every tick.
    Live,
    /// Pinned to now + `offset_hours` by the user; ticks are off.
    Manual { offset_hours: f64 },
}

/// A map view waiting for its screen region.
#[derive(Debug)]
pub struct PendingMapView<S = SolarTerminator> {
    config: MapViewConfig,
    source: S,
}

impl<S: NightSource> PendingMapView<S> {
    #[must_use]
    pub fn new(config: MapViewConfig, source: S) -> Self {
        Self { config, source }
    }

    #[must_use]
    pub fn config(&self) -> &MapViewConfig {
        &self.config
    }

    /// Build the map surface for `region`, draw the first overlay, then arm
    /// the periodic refresh.
    ///
    /// `notify` is called from the timer task after each tick is queued.
    /// Must be called within a Tokio runtime context.
    pub fn attach<F>(self, region: ScreenRegion, notify: F) -> Result<MapView<S>, AttachError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if region.is_empty() {
            return Err(AttachError::EmptyRegion {
                width: region.width,
                height: region.height,
            });
        }
        self.config.validate()?;

        let surface = MapSurface::new(
            BaseLayer::new(self.config.tile_url.clone()),
            Viewport {
                center: self.config.center,
                zoom: self.config.zoom,
            },
            self.config.controls.clone(),
        );
        let (x, y) = surface.viewport().projected_center();
        info!(
            "Map attached at {}x{} px, center ({:.0}, {:.0}) m, zoom {}",
            region.width,
            region.height,
            x,
            y,
            surface.viewport().zoom
        );

        let mut view = MapView {
            config: self.config,
            source: self.source,
            surface,
            region,
            mode: RefreshMode::Live,
            ticker: None,
            notify: Arc::new(notify),
        };
        view.refresh_overlay(None);
        view.arm_ticker();
        Ok(view)
    }
}

/// An attached map view.
pub struct MapView<S = SolarTerminator> {
    config: MapViewConfig,
    source: S,
    surface: MapSurface,
    region: ScreenRegion,
    mode: RefreshMode,
    ticker: Option<RefreshTicker>,
    notify: Arc<dyn Fn() + Send + Sync>,
}

impl<S: std::fmt::Debug> std::fmt::Debug for MapView<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapView")
            .field("source", &self.source)
            .field("surface", &self.surface)
            .field("region", &self.region)
            .field("mode", &self.mode)
            .field("ticker", &self.ticker)
            .finish_non_exhaustive()
    }
}

impl<S: NightSource> MapView<S> {
    /// Replace the overlay with one computed for `at` (now if `None`).
    pub fn refresh_overlay(&mut self, at: Option<DateTime<Utc>>) -> &DayNightOverlay {
        let instant = at.unwrap_or_else(Utc::now);
        let overlay = DayNightOverlay::new(self.source.night_polygon(instant), self.config.overlay_style);
        let (current, previous) = self.surface.replace_overlay(overlay);
        if let Some(previous) = previous {
            debug!("Overlay {} replaced by {}", previous.instant(), instant);
        }
        current
    }

    /// Act on timer ticks that fired since the last call.
    ///
    /// Returns true if the overlay was refreshed. Several pending ticks
    /// collapse into one refresh.
    pub fn process_ticks(&mut self) -> bool {
        let Some(ticker) = self.ticker.as_mut() else {
            return false;
        };
        if ticker.try_recv_all().is_empty() || self.mode != RefreshMode::Live {
            return false;
        }
        self.refresh_overlay(None);
        true
    }

    /// Pin the overlay to now + `hours`.
    ///
    /// The periodic refresh is stopped first so the next tick cannot
    /// overwrite the chosen instant. It stays off until [`MapView::resume_live`].
    pub fn set_time_offset(&mut self, hours: f64) -> &DayNightOverlay {
        self.cancel_refresh();
        self.mode = RefreshMode::Manual { offset_hours: hours };
        self.refresh_overlay(Some(offset::time_ahead(hours)))
    }

    /// Go back to following the wall clock and restart the periodic refresh.
    pub fn resume_live(&mut self) -> &DayNightOverlay {
        self.cancel_refresh();
        self.mode = RefreshMode::Live;
        self.arm_ticker();
        info!("Overlay back to live time");
        self.refresh_overlay(None)
    }

    /// Stop the periodic refresh. Safe to call repeatedly.
    pub fn cancel_refresh(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    fn arm_ticker(&mut self) {
        let notify = Arc::clone(&self.notify);
        self.ticker = Some(RefreshTicker::spawn(
            self.config.refresh_period,
            Box::new(move || notify()),
        ));
    }

    /// Label for the offset control: local clock time at now + `hours`.
    #[must_use]
    pub fn format_thumb_label(&self, hours: f64) -> String {
        offset::format_thumb_label(hours, &self.config.clock_format)
    }

    /// Track a new screen size. Empty regions are ignored.
    pub fn resize(&mut self, region: ScreenRegion) {
        if region.is_empty() {
            debug!("Ignoring resize to empty region {}x{}", region.width, region.height);
            return;
        }
        self.region = region;
    }

    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Cancellation token of the running schedule, if one is armed.
    #[must_use]
    pub fn refresh_token(&self) -> Option<CancellationToken> {
        self.ticker.as_ref().map(RefreshTicker::cancellation_token)
    }
}

impl<S> MapView<S> {
    #[must_use]
    pub fn mode(&self) -> RefreshMode {
        self.mode
    }

    #[must_use]
    pub fn surface(&self) -> &MapSurface {
        &self.surface
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        self.surface.viewport_mut()
    }

    #[must_use]
    pub fn region(&self) -> ScreenRegion {
        self.region
    }

    #[must_use]
    pub fn config(&self) -> &MapViewConfig {
        &self.config
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminator::NightPolygon;
    use chrono::TimeDelta;
    use std::cell::RefCell;

    /// Notes whether the refresh schedule was already cancelled each time
    /// geometry is requested.
    #[derive(Debug, Default)]
    struct ScheduleAwareSource {
        schedule: RefCell<Option<CancellationToken>>,
        cancelled_at_request: RefCell<Vec<bool>>,
    }

    impl NightSource for ScheduleAwareSource {
        fn night_polygon(&self, instant: DateTime<Utc>) -> NightPolygon {
            let cancelled = self
                .schedule
                .borrow()
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled);
            self.cancelled_at_request.borrow_mut().push(cancelled);
            NightPolygon::new(instant, Vec::new(), -90.0)
        }
    }

    /// Records every instant it is asked for.
    #[derive(Debug, Default)]
    struct RecordingSource {
        requests: RefCell<Vec<DateTime<Utc>>>,
    }

    impl NightSource for RecordingSource {
        fn night_polygon(&self, instant: DateTime<Utc>) -> NightPolygon {
            self.requests.borrow_mut().push(instant);
            NightPolygon::new(instant, Vec::new(), -90.0)
        }
    }

    fn region() -> ScreenRegion {
        ScreenRegion::new(1280.0, 720.0)
    }

    fn attach() -> MapView<RecordingSource> {
        PendingMapView::new(MapViewConfig::default(), RecordingSource::default())
            .attach(region(), || {})
            .unwrap()
    }

    fn overlay_instant(view: &MapView<RecordingSource>) -> DateTime<Utc> {
        view.surface().overlay().unwrap().instant()
    }

    #[tokio::test]
    async fn test_attach_draws_base_and_one_overlay() {
        let view = attach();
        let layers: Vec<_> = view.surface().layers().collect();
        assert_eq!(layers.len(), 2);
        assert!(matches!(layers[0], crate::surface::Layer::Base(_)));
        assert_eq!(view.surface().overlay_count(), 1);
        assert_eq!(view.source().requests.borrow().len(), 1);
        assert!(view.is_ticking());
        assert_eq!(view.mode(), RefreshMode::Live);
    }

    #[tokio::test]
    async fn test_attach_uses_configured_viewport() {
        let view = attach();
        let viewport = view.surface().viewport();
        assert!((viewport.zoom - 4.0).abs() < f64::EPSILON);
        assert!((viewport.center.lon - -101.320_426).abs() < 1e-9);
        assert!(view.surface().controls().is_empty());
    }

    #[tokio::test]
    async fn test_attach_rejects_empty_region() {
        let err = PendingMapView::new(MapViewConfig::default(), RecordingSource::default())
            .attach(ScreenRegion::new(0.0, 720.0), || {})
            .unwrap_err();
        assert!(matches!(err, AttachError::EmptyRegion { .. }));
    }

    #[tokio::test]
    async fn test_attach_rejects_invalid_config() {
        let config = MapViewConfig {
            zoom: 40.0,
            ..Default::default()
        };
        let err = PendingMapView::new(config, RecordingSource::default())
            .attach(region(), || {})
            .unwrap_err();
        assert_eq!(err, AttachError::Config(ConfigError::InvalidZoom(40.0)));
    }

    #[test]
    fn test_config_requires_tile_placeholders() {
        let config = MapViewConfig {
            tile_url: "https://tiles.example.com/{z}/{x}.png".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::MissingPlaceholder("{y}")));
    }

    #[test]
    fn test_config_rejects_inverted_offset_range() {
        let config = MapViewConfig {
            offset_min_hours: 5.0,
            offset_max_hours: -5.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidOffsetRange { .. })));
    }

    #[tokio::test]
    async fn test_successive_refreshes_leave_latest_overlay() {
        let mut view = attach();
        let t1 = Utc::now() - TimeDelta::hours(3);
        let t2 = Utc::now() + TimeDelta::hours(7);

        view.refresh_overlay(Some(t1));
        view.refresh_overlay(Some(t2));

        assert_eq!(view.surface().overlay_count(), 1);
        assert_eq!(overlay_instant(&view), t2);
    }

    #[tokio::test]
    async fn test_refresh_defaults_to_now() {
        let mut view = attach();
        let before = Utc::now();
        let instant = view.refresh_overlay(None).instant();
        let after = Utc::now();
        assert!(instant >= before && instant <= after);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_refreshes_in_live_mode() {
        let mut view = attach();
        assert!(!view.process_ticks());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(view.process_ticks());
        assert_eq!(view.source().requests.borrow().len(), 2);
        assert_eq!(view.surface().overlay_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_offset_cancels_ticks_and_pins_instant() {
        let mut view = attach();
        assert!(view.is_ticking());

        let before = Utc::now();
        view.set_time_offset(6.0);
        let after = Utc::now();

        assert!(!view.is_ticking());
        assert_eq!(view.mode(), RefreshMode::Manual { offset_hours: 6.0 });
        let pinned = overlay_instant(&view);
        assert!(pinned >= before + TimeDelta::hours(6));
        assert!(pinned <= after + TimeDelta::hours(6));

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert!(!view.process_ticks());
        assert_eq!(overlay_instant(&view), pinned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_fractional_offset() {
        let mut view = attach();
        let before = Utc::now();
        let instant = view.set_time_offset(-1.5).instant();
        assert!(instant <= before - TimeDelta::minutes(89));
        assert!(instant >= before - TimeDelta::minutes(91));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_live_rearms_ticks() {
        let mut view = attach();
        view.set_time_offset(3.0);
        assert!(!view.is_ticking());

        view.resume_live();
        assert!(view.is_ticking());
        assert_eq!(view.mode(), RefreshMode::Live);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(view.process_ticks());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_refresh_twice() {
        let mut view = attach();
        view.cancel_refresh();
        view.cancel_refresh();
        assert!(!view.is_ticking());

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert!(!view.process_ticks());
        assert_eq!(view.source().requests.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_resize_ignores_empty_region() {
        let mut view = attach();
        view.resize(ScreenRegion::new(0.0, 0.0));
        assert_eq!(view.region(), region());
        view.resize(ScreenRegion::new(800.0, 600.0));
        assert_eq!(view.region(), ScreenRegion::new(800.0, 600.0));
    }

    #[tokio::test]
    async fn test_thumb_label_uses_clock_format() {
        let config = MapViewConfig {
            clock_format: "%Y".to_string(),
            ..Default::default()
        };
        let view = PendingMapView::new(config, RecordingSource::default())
            .attach(region(), || {})
            .unwrap();
        let label = view.format_thumb_label(0.0);
        assert_eq!(label.len(), 4);
        assert!(label.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_offset_cancels_schedule_before_refreshing() {
        let mut view = PendingMapView::new(MapViewConfig::default(), ScheduleAwareSource::default())
            .attach(region(), || {})
            .unwrap();
        *view.source().schedule.borrow_mut() = view.refresh_token();

        view.set_time_offset(2.0);

        assert_eq!(*view.source().cancelled_at_request.borrow(), vec![false, true]);
    }

    #[test]
    fn test_config_rejects_bad_clock_format() {
        let config = MapViewConfig {
            clock_format: "%Q".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidClockFormat("%Q".to_string()))
        );
    }

    #[test]
    fn test_config_rejects_oversized_refresh_period() {
        let config = MapViewConfig {
            refresh_period: Duration::from_secs(u64::MAX),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::RefreshPeriodTooLong(Duration::from_secs(u64::MAX)))
        );

        let config = MapViewConfig {
            refresh_period: MAX_REFRESH_PERIOD,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
