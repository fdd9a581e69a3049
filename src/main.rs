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

mod app;
mod config;
mod map;

use app::DayNightApp;
use clap::Parser;
use config::{AppConfig, ConfigOverrides};
use eframe::egui;
use log::{error, info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "daynight-desktop")]
#[command(about = "World map with a live day/night terminator", long_about = None)]
#[command(version)]
struct Args {
    /// Initial map center longitude
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Initial map center latitude
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Initial zoom level
    #[arg(long)]
    zoom: Option<f64>,

    /// Seconds between live overlay refreshes
    #[arg(long)]
    refresh_secs: Option<u64>,

    /// XYZ tile URL template, e.g. https://tile.example.com/{z}/{x}/{y}.png
    #[arg(long)]
    tile_url: Option<String>,

    /// Print the configuration file location and exit
    #[arg(long)]
    print_config_path: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            center_lon: self.lon,
            center_lat: self.lat,
            zoom: self.zoom,
            refresh_interval_secs: self.refresh_secs,
            tile_url: self.tile_url.clone(),
        }
    }
}

fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.print_config_path {
        match AppConfig::get_config_path() {
            Ok(path) => println!("{}", path.display()),
            Err(e) => error!("Could not resolve config path: {e}"),
        }
        return Ok(());
    }

    info!("Starting DayNight Desktop...");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });
    config.apply_overrides(&args.overrides());

    // Refresh timer tasks are spawned onto this runtime from the UI thread
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| eframe::Error::AppCreation(Box::new(e)))?;
    let _guard = runtime.enter();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_title("DayNight Desktop"),
        ..Default::default()
    };

    eframe::run_native(
        "DayNight Desktop",
        options,
        Box::new(move |cc| Ok(Box::new(DayNightApp::new(cc, &config)))),
    )
}
