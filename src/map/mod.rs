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

//! Map rendering.
//!
//! Paints base tiles, the night overlay and the optional controls for an
//! attached [`MapView`], and turns drag/pinch input into viewport changes.

pub mod source;
pub mod tiles;

pub use source::XyzTileSource;
pub use tiles::TileManager;

use daynight::{Control, DayNightOverlay, LonLat, MapView, NightSource, Viewport, WebMercator};
use egui::{Color32, Mesh, Pos2, Rect, Sense};
use walkers::sources::TileSource;

use tiles::TILE_SIZE;

const BACKGROUND: Color32 = Color32::from_rgb(170, 211, 223);
const CONTROL_SIZE: f32 = 28.0;
const CONTROL_MARGIN: f32 = 10.0;

/// Pixel scale of the whole world at a zoom level.
fn world_pixels(zoom: f64) -> f64 {
    f64::from(TILE_SIZE) * 2_f64.powf(zoom)
}

/// Screen position of a point on world copy `copy` (0 is the primary world).
#[allow(clippy::cast_possible_truncation, reason = "screen coordinates fit in f32")]
fn to_screen(point: LonLat, copy: i32, viewport: &Viewport, rect: Rect) -> Pos2 {
    let scale = world_pixels(viewport.zoom);
    let (cx, cy) = WebMercator::to_world(viewport.center);
    let (x, y) = WebMercator::to_world(point);
    let center = rect.center();
    Pos2::new(
        center.x + ((x + f64::from(copy) - cx) * scale) as f32,
        center.y + ((y - cy) * scale) as f32,
    )
}

/// Range of world copies that intersect the viewport horizontally.
#[allow(clippy::cast_possible_truncation, reason = "copy index is tiny")]
fn visible_world_copies(viewport: &Viewport, rect: Rect) -> std::ops::RangeInclusive<i32> {
    let (cx, _) = WebMercator::to_world(viewport.center);
    let half_span = f64::from(rect.width()) / 2.0 / world_pixels(viewport.zoom);
    let first = (cx - half_span).floor() as i32;
    let last = (cx + half_span).floor() as i32;
    first..=last
}

/// Triangle mesh filling the night side, one quad per terminator segment,
/// repeated for each visible world copy.
pub fn night_mesh(overlay: &DayNightOverlay, viewport: &Viewport, rect: Rect) -> Mesh {
    let [r, g, b, a] = overlay.style().fill;
    let color = Color32::from_rgba_unmultiplied(r, g, b, a);
    let polygon = overlay.polygon();
    let pole = polygon.dark_pole();

    let mut mesh = Mesh::default();
    for copy in visible_world_copies(viewport, rect) {
        let pole_y = to_screen(LonLat::new(0.0, pole), copy, viewport, rect).y;
        for segment in polygon.terminator().windows(2) {
            let west = to_screen(segment[0], copy, viewport, rect);
            let east = to_screen(segment[1], copy, viewport, rect);

            #[allow(clippy::cast_possible_truncation, reason = "vertex count stays far below u32::MAX")]
            let base = mesh.vertices.len() as u32;
            mesh.colored_vertex(west, color);
            mesh.colored_vertex(east, color);
            mesh.colored_vertex(Pos2::new(west.x, pole_y), color);
            mesh.colored_vertex(Pos2::new(east.x, pole_y), color);
            mesh.add_triangle(base, base + 1, base + 2);
            mesh.add_triangle(base + 1, base + 3, base + 2);
        }
    }
    mesh
}

/// Tile zoom level and on-screen tile size for a fractional view zoom.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "zoom is clamped to the tile source range"
)]
fn tile_zoom(zoom: f64, max_zoom: u8) -> (u8, f32) {
    let level = zoom.round().clamp(0.0, f64::from(max_zoom));
    let scale = 2_f64.powf(zoom - level);
    (level as u8, TILE_SIZE * scale as f32)
}

pub fn draw_map<S: NightSource>(ui: &mut egui::Ui, view: &mut MapView<S>, tiles: &TileManager) {
    let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
    let rect = response.rect;

    painter.rect_filled(rect, 0.0, BACKGROUND);

    // Pinch or ctrl+scroll
    if response.hovered() {
        let zoom_delta = ui.ctx().input(|i| i.zoom_delta());
        if (zoom_delta - 1.0).abs() > 0.001 {
            view.viewport_mut().zoom_by(f64::from(zoom_delta.log2()));
        }
    }

    if response.dragged() {
        let delta = response.drag_delta();
        view.viewport_mut()
            .pan_pixels(f64::from(delta.x), f64::from(delta.y));
    }

    let viewport = *view.surface().viewport();

    // Base imagery
    let (level, tile_pixels) = tile_zoom(viewport.zoom, tiles.source().max_zoom());
    let center = rect.center();
    let mut tiles_drawn = 0;
    for placed in TileManager::visible_tiles(viewport.center, level, rect.width(), rect.height(), tile_pixels) {
        if let Some(texture) = tiles.get_tile(placed.coord, ui.ctx()) {
            let tile_rect = Rect::from_min_size(
                Pos2::new(center.x + placed.offset_x, center.y + placed.offset_y),
                egui::vec2(tile_pixels, tile_pixels),
            );
            painter.image(
                texture.id(),
                tile_rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
            tiles_drawn += 1;
        }
    }

    // Night overlay on top
    if let Some(overlay) = view.surface().overlay() {
        painter.add(egui::Shape::mesh(night_mesh(overlay, &viewport, rect)));
    }

    draw_tile_status(&painter, rect, tiles, tiles_drawn);
    draw_controls(ui, view, tiles, rect);
}

fn draw_tile_status(painter: &egui::Painter, rect: Rect, tiles: &TileManager, tiles_drawn: usize) {
    let errors = tiles.error_count();
    let status = if errors > 0 {
        format!("Failed to load {errors} tiles")
    } else if tiles.has_loading_tiles() && tiles_drawn == 0 {
        "Loading map tiles...".to_string()
    } else {
        return;
    };
    painter.text(
        rect.right_top() + egui::vec2(-CONTROL_MARGIN, CONTROL_MARGIN),
        egui::Align2::RIGHT_TOP,
        status,
        egui::FontId::proportional(13.0),
        Color32::from_rgb(180, 40, 40),
    );
}

fn draw_controls<S: NightSource>(
    ui: &mut egui::Ui,
    view: &mut MapView<S>,
    tiles: &TileManager,
    rect: Rect,
) {
    if view.surface().has_control(Control::Zoom) {
        let origin = rect.left_top() + egui::vec2(CONTROL_MARGIN, CONTROL_MARGIN);
        let size = egui::vec2(CONTROL_SIZE, CONTROL_SIZE);
        let zoom_in = Rect::from_min_size(origin, size);
        let zoom_out = Rect::from_min_size(origin + egui::vec2(0.0, CONTROL_SIZE + 4.0), size);

        if ui.put(zoom_in, egui::Button::new("+")).on_hover_text("Zoom in").clicked() {
            view.viewport_mut().zoom_by(1.0);
        }
        if ui.put(zoom_out, egui::Button::new("−")).on_hover_text("Zoom out").clicked() {
            view.viewport_mut().zoom_by(-1.0);
        }
    }

    if view.surface().has_control(Control::Attribution) {
        let attribution = tiles.source().attribution();
        let area = Rect::from_min_max(
            rect.right_bottom() - egui::vec2(220.0, 24.0),
            rect.right_bottom(),
        );
        ui.put(
            area,
            egui::Hyperlink::from_label_and_url(attribution.text, attribution.url),
        );
    }
}
