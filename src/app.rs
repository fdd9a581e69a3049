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

use daynight::{BaseLayer, MapView, PendingMapView, RefreshMode, ScreenRegion, SolarTerminator};
use eframe::egui;
use log::{error, info};

use crate::config::AppConfig;
use crate::map::{self, TileManager, XyzTileSource};

/// Lifecycle of the map view inside the window.
enum MapViewState {
    /// Waiting for the first frame with a usable map area.
    Pending(PendingMapView),
    Ready(Box<MapView>),
    Failed(String),
}

pub struct DayNightApp {
    state: MapViewState,
    tiles: TileManager,
    /// Slider position in hours from now.
    offset_hours: f64,
}

impl DayNightApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: &AppConfig) -> Self {
        let view_config = config.map_view_config();
        let source = XyzTileSource::new(BaseLayer::new(view_config.tile_url.clone()));
        let terminator = SolarTerminator::new(config.terminator_resolution_degrees);

        Self {
            state: MapViewState::Pending(PendingMapView::new(view_config, terminator)),
            tiles: TileManager::new(source),
            offset_hours: 0.0,
        }
    }

    /// Attach the pending view once the map area has a size.
    fn attach_if_ready(&mut self, ctx: &egui::Context, region: ScreenRegion) {
        if region.is_empty() || !matches!(self.state, MapViewState::Pending(_)) {
            return;
        }
        let MapViewState::Pending(pending) =
            std::mem::replace(&mut self.state, MapViewState::Failed(String::new()))
        else {
            return;
        };

        let repaint_ctx = ctx.clone();
        self.state = match pending.attach(region, move || repaint_ctx.request_repaint()) {
            Ok(view) => {
                info!("Day/night map ready");
                MapViewState::Ready(Box::new(view))
            }
            Err(e) => {
                error!("Failed to attach map view: {e}");
                MapViewState::Failed(e.to_string())
            }
        };
    }
}

/// Bottom panel: offset slider with clock label, live toggle and overlay time.
fn time_controls(ui: &mut egui::Ui, view: &mut MapView, offset_hours: &mut f64) {
    let config = view.config();
    let range = config.offset_min_hours..=config.offset_max_hours;
    let step = config.offset_step_hours;

    ui.horizontal(|ui| {
        ui.label("Time offset:");

        let label_view: &MapView = view;
        let slider = egui::Slider::new(offset_hours, range)
            .step_by(step)
            .custom_formatter(|hours, _| label_view.format_thumb_label(hours));
        let changed = ui.add(slider).changed();

        if changed {
            view.set_time_offset(*offset_hours);
        }

        let live = view.mode() == RefreshMode::Live;
        if ui
            .add_enabled(!live, egui::Button::new("Live"))
            .on_hover_text("Follow the current time")
            .clicked()
        {
            *offset_hours = 0.0;
            view.resume_live();
        }

        ui.separator();

        if let Some(overlay) = view.surface().overlay() {
            let local = overlay.instant().with_timezone(&chrono::Local);
            let status = match view.mode() {
                RefreshMode::Live => format!("Live · {}", local.format("%Y-%m-%d %H:%M")),
                RefreshMode::Manual { offset_hours } => {
                    format!("{offset_hours:+.2} h · {}", local.format("%Y-%m-%d %H:%M"))
                }
            };
            ui.label(status);
        }
    });
}

impl eframe::App for DayNightApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let MapViewState::Ready(view) = &mut self.state {
            view.process_ticks();

            egui::TopBottomPanel::bottom("time_controls").show(ctx, |ui| {
                time_controls(ui, view, &mut self.offset_hours);
            });
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let rect = ui.available_rect_before_wrap();
                let region = ScreenRegion::new(rect.width(), rect.height());
                self.attach_if_ready(ctx, region);

                match &mut self.state {
                    MapViewState::Ready(view) => {
                        view.resize(region);
                        map::draw_map(ui, &mut **view, &self.tiles);
                    }
                    MapViewState::Pending(_) => {
                        ui.centered_and_justified(|ui| ui.spinner());
                    }
                    MapViewState::Failed(message) => {
                        ui.centered_and_justified(|ui| {
                            ui.colored_label(egui::Color32::RED, format!("Map unavailable: {message}"));
                        });
                    }
                }
            });

        // Keep tiles streaming in while downloads are outstanding
        if self.tiles.has_loading_tiles() {
            ctx.request_repaint_after(std::time::Duration::from_millis(250));
        }
    }
}
