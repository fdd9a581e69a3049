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

//! Map surface state: base imagery, viewport, controls and the overlay slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::projection::{LonLat, WebMercator};
use crate::terminator::NightPolygon;

/// ArcGIS World Topographic basemap. Note the `{y}/{x}` (row/column) order.
pub const DEFAULT_TILE_URL: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Topo_Map/MapServer/tile/{z}/{y}/{x}";

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 18.0;

/// Base imagery layer backed by an XYZ tile service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseLayer {
    /// URL template with `{z}`, `{x}` and `{y}` placeholders.
    pub url_template: String,
}

impl BaseLayer {
    #[must_use]
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
        }
    }

    /// URL of a single tile.
    #[must_use]
    pub fn tile_url(&self, zoom: u8, x: u32, y: u32) -> String {
        self.url_template
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

impl Default for BaseLayer {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_URL)
    }
}

/// Visible map region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LonLat,
    pub zoom: f64,
}

impl Viewport {
    /// Center in EPSG:3857 meters.
    #[must_use]
    pub fn projected_center(&self) -> (f64, f64) {
        WebMercator::to_meters(self.center)
    }

    /// Change zoom by `delta` levels, staying within the supported range.
    pub fn zoom_by(&mut self, delta: f64) {
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Move the center by a pixel delta at the current zoom.
    pub fn pan_pixels(&mut self, dx: f64, dy: f64) {
        let world_size = 256.0 * 2_f64.powf(self.zoom);
        let (x, y) = WebMercator::to_world(self.center);
        let x = (x - dx / world_size).rem_euclid(1.0);
        let y = (y - dy / world_size).clamp(0.0, 1.0);
        self.center = WebMercator::from_world(x, y);
    }
}

/// Interactive controls that can be composed onto the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    /// Zoom in/out buttons.
    Zoom,
    /// Tile provider attribution.
    Attribution,
}

/// Fill style for the night overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayStyle {
    /// RGBA fill, unmultiplied alpha.
    pub fill: [u8; 4],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        // Dark navy at half opacity
        Self {
            fill: [0, 0, 50, 128],
        }
    }
}

/// Day/night overlay computed for one instant. Replaced on every refresh, never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct DayNightOverlay {
    polygon: NightPolygon,
    style: OverlayStyle,
}

impl DayNightOverlay {
    #[must_use]
    pub fn new(polygon: NightPolygon, style: OverlayStyle) -> Self {
        Self { polygon, style }
    }

    #[must_use]
    pub fn instant(&self) -> DateTime<Utc> {
        self.polygon.instant()
    }

    #[must_use]
    pub fn polygon(&self) -> &NightPolygon {
        &self.polygon
    }

    #[must_use]
    pub fn style(&self) -> OverlayStyle {
        self.style
    }
}

/// One entry in the rendered layer order.
#[derive(Debug, Clone, Copy)]
pub enum Layer<'a> {
    Base(&'a BaseLayer),
    Overlay(&'a DayNightOverlay),
}

impl Layer<'_> {
    #[must_use]
    pub fn is_overlay(&self) -> bool {
        matches!(self, Layer::Overlay(_))
    }
}

/// The on-screen map.
///
/// The overlay lives in its own slot rather than in a tagged layer list, so
/// there is never more than one of them.
#[derive(Debug, Clone)]
pub struct MapSurface {
    base: BaseLayer,
    viewport: Viewport,
    controls: Vec<Control>,
    overlay: Option<DayNightOverlay>,
}

impl MapSurface {
    #[must_use]
    pub fn new(base: BaseLayer, viewport: Viewport, controls: Vec<Control>) -> Self {
        Self {
            base,
            viewport,
            controls,
            overlay: None,
        }
    }

    #[must_use]
    pub fn base_layer(&self) -> &BaseLayer {
        &self.base
    }

    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    #[must_use]
    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    #[must_use]
    pub fn has_control(&self, control: Control) -> bool {
        self.controls.contains(&control)
    }

    #[must_use]
    pub fn overlay(&self) -> Option<&DayNightOverlay> {
        self.overlay.as_ref()
    }

    /// Swap in a new overlay. Returns the installed overlay and the one it replaced.
    pub fn replace_overlay(
        &mut self,
        overlay: DayNightOverlay,
    ) -> (&DayNightOverlay, Option<DayNightOverlay>) {
        let previous = self.overlay.take();
        let current: &DayNightOverlay = self.overlay.insert(overlay);
        (current, previous)
    }

    /// Layers in draw order: base imagery first, overlay on top.
    pub fn layers(&self) -> impl Iterator<Item = Layer<'_>> {
        std::iter::once(Layer::Base(&self.base)).chain(self.overlay.iter().map(Layer::Overlay))
    }

    #[must_use]
    pub fn overlay_count(&self) -> usize {
        self.layers().filter(Layer::is_overlay).count()
    }
}
