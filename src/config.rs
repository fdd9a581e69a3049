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

//! Application configuration management.
//!
//! Settings persist as TOML through `confy`. Missing keys fall back to their
//! defaults, so older files keep loading as new settings are added. Command
//! line flags and the `DAYNIGHT_TILE_URL` environment variable are layered on
//! top at startup and are not written back.

use std::time::Duration;

use daynight::{Control, LonLat, MapViewConfig, OverlayStyle, DEFAULT_CLOCK_FORMAT, DEFAULT_TILE_URL};
use log::info;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "daynight-desktop";
const CONFIG_NAME: &str = "config";

/// Environment variable that overrides the configured tile URL template.
pub const TILE_URL_ENV: &str = "DAYNIGHT_TILE_URL";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// XYZ tile URL template with `{z}`, `{x}` and `{y}` placeholders
    #[serde(default = "default_tile_url")]
    pub tile_url: String,

    /// Initial map center longitude
    #[serde(default = "default_center_lon")]
    pub center_lon: f64,

    /// Initial map center latitude
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,

    /// Initial zoom level (1.0 - 18.0)
    #[serde(default = "default_zoom")]
    pub zoom: f64,

    /// Map controls to show
    #[serde(default = "default_controls")]
    pub controls: Vec<Control>,

    /// Night overlay RGBA fill
    #[serde(default = "default_overlay_fill")]
    pub overlay_fill: [u8; 4],

    /// Seconds between live overlay refreshes
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_offset_min_hours")]
    pub offset_min_hours: f64,

    #[serde(default = "default_offset_max_hours")]
    pub offset_max_hours: f64,

    #[serde(default = "default_offset_step_hours")]
    pub offset_step_hours: f64,

    /// `strftime` format for the slider label
    #[serde(default = "default_clock_format")]
    pub clock_format: String,

    /// Longitude spacing of terminator samples, in degrees
    #[serde(default = "default_terminator_resolution")]
    pub terminator_resolution_degrees: f64,

    #[serde(default = "default_window_width")]
    pub window_width: f32,

    #[serde(default = "default_window_height")]
    pub window_height: f32,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_tile_url() -> String {
    DEFAULT_TILE_URL.to_string()
}

fn default_center_lon() -> f64 {
    -101.320_426
}

fn default_center_lat() -> f64 {
    42.041_532
}

fn default_zoom() -> f64 {
    4.0
}

fn default_controls() -> Vec<Control> {
    vec![Control::Zoom]
}

fn default_overlay_fill() -> [u8; 4] {
    OverlayStyle::default().fill
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_offset_min_hours() -> f64 {
    -24.0
}

fn default_offset_max_hours() -> f64 {
    24.0
}

fn default_offset_step_hours() -> f64 {
    0.25
}

fn default_clock_format() -> String {
    DEFAULT_CLOCK_FORMAT.to_string()
}

fn default_terminator_resolution() -> f64 {
    1.0
}

fn default_window_width() -> f32 {
    1280.0
}

fn default_window_height() -> f32 {
    800.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            tile_url: default_tile_url(),
            center_lon: default_center_lon(),
            center_lat: default_center_lat(),
            zoom: default_zoom(),
            controls: default_controls(),
            overlay_fill: default_overlay_fill(),
            refresh_interval_secs: default_refresh_interval_secs(),
            offset_min_hours: default_offset_min_hours(),
            offset_max_hours: default_offset_max_hours(),
            offset_step_hours: default_offset_step_hours(),
            clock_format: default_clock_format(),
            terminator_resolution_degrees: default_terminator_resolution(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

/// Values supplied on the command line. `None` keeps the stored setting.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub center_lon: Option<f64>,
    pub center_lat: Option<f64>,
    pub zoom: Option<f64>,
    pub refresh_interval_secs: Option<u64>,
    pub tile_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults on first run
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Layer command line flags, then the environment, over the stored settings
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        self.apply_overrides_with_env(overrides, std::env::var(TILE_URL_ENV).ok());
    }

    fn apply_overrides_with_env(&mut self, overrides: &ConfigOverrides, env_tile_url: Option<String>) {
        if let Some(lon) = overrides.center_lon {
            self.center_lon = lon;
        }
        if let Some(lat) = overrides.center_lat {
            self.center_lat = lat;
        }
        if let Some(zoom) = overrides.zoom {
            self.zoom = zoom;
        }
        if let Some(secs) = overrides.refresh_interval_secs {
            self.refresh_interval_secs = secs;
        }

        // Explicit flag wins over the environment
        if let Some(url) = overrides.tile_url.clone().or(env_tile_url) {
            info!("Using tile URL override: {url}");
            self.tile_url = url;
        }
    }

    /// Settings for the map view library
    pub fn map_view_config(&self) -> MapViewConfig {
        MapViewConfig {
            tile_url: self.tile_url.clone(),
            center: LonLat::new(self.center_lon, self.center_lat),
            zoom: self.zoom,
            controls: self.controls.clone(),
            overlay_style: OverlayStyle {
                fill: self.overlay_fill,
            },
            refresh_period: Duration::from_secs(self.refresh_interval_secs),
            offset_min_hours: self.offset_min_hours,
            offset_max_hours: self.offset_max_hours,
            offset_step_hours: self.offset_step_hours,
            clock_format: self.clock_format.clone(),
        }
    }
}
