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

//! Day/night terminator overlay for a slippy map.
//!
//! This library holds everything about the overlay that does not depend on a
//! UI toolkit:
//!
//! - **Geometry**: a low-precision solar ephemeris ([`solar`]) and the night
//!   polygon derived from it ([`terminator`])
//! - **Surface**: base imagery, viewport, controls and a single overlay slot
//!   ([`surface`]), with Web Mercator helpers in [`projection`]
//! - **View**: the attach/refresh lifecycle ([`view`]), driven by a periodic
//!   Tokio timer ([`ticker`]) and user time offsets ([`offset`])
//!
//! # Quick Start
//!
//! ```no_run
//! use daynight::{MapViewConfig, PendingMapView, ScreenRegion, SolarTerminator};
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let pending = PendingMapView::new(MapViewConfig::default(), SolarTerminator::default());
//!
//!     // Once the window knows how big the map area is:
//!     let mut view = pending
//!         .attach(ScreenRegion::new(1280.0, 720.0), || {})
//!         .expect("valid config");
//!
//!     // Preview the terminator six hours from now
//!     view.set_time_offset(6.0);
//!     println!("label: {}", view.format_thumb_label(6.0));
//!
//!     // Back to the wall clock, refreshed every 30 seconds
//!     view.resume_live();
//!     loop {
//!         tokio::time::sleep(Duration::from_secs(1)).await;
//!         if view.process_ticks() {
//!             println!("overlay now at {}", view.surface().overlay().unwrap().instant());
//!         }
//!     }
//! }
//! ```

pub mod offset;
pub mod projection;
pub mod solar;
pub mod surface;
pub mod terminator;
pub mod ticker;
pub mod view;

pub use offset::{
    format_thumb_label, is_valid_clock_format, time_ahead, time_ahead_from, DEFAULT_CLOCK_FORMAT,
};
pub use projection::{LonLat, WebMercator, MAX_MERCATOR_LATITUDE};
pub use solar::SunPosition;
pub use surface::{
    BaseLayer, Control, DayNightOverlay, Layer, MapSurface, OverlayStyle, Viewport,
    DEFAULT_TILE_URL, MAX_ZOOM, MIN_ZOOM,
};
pub use terminator::{NightPolygon, NightSource, SolarTerminator};
pub use ticker::{RefreshTicker, Tick, MAX_REFRESH_PERIOD};
pub use view::{
    AttachError, ConfigError, MapView, MapViewConfig, PendingMapView, RefreshMode, ScreenRegion,
};
