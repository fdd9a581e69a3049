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

//! Base imagery tiles: visibility, disk cache and background download.

use daynight::{LonLat, WebMercator};
use egui::{ColorImage, TextureHandle};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use walkers::sources::TileSource;
use walkers::TileId;

use super::source::XyzTileSource;

pub const TILE_SIZE: f32 = 256.0;
const CACHE_DURATION_DAYS: u64 = 7;
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum TileError {
    #[error("tile request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tile server returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to decode tile image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("tile cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    fn tile_id(self) -> TileId {
        TileId {
            x: self.x,
            y: self.y,
            zoom: self.zoom,
        }
    }

    fn texture_name(self) -> String {
        format!("tile_{}_{}/{}", self.zoom, self.x, self.y)
    }
}

/// A tile to draw, with its top-left corner relative to the viewport center in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedTile {
    pub coord: TileCoord,
    pub offset_x: f32,
    pub offset_y: f32,
}

pub enum TileState {
    Loading,
    Loaded(TextureHandle),
    Failed,
}

pub struct TileManager {
    source: Arc<XyzTileSource>,
    cache_dir: PathBuf,
    tiles: Arc<Mutex<HashMap<TileCoord, TileState>>>,
    in_flight: Arc<Mutex<HashSet<TileCoord>>>,
}

impl std::fmt::Debug for TileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileManager")
            .field("source", &self.source)
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TileManager {
    pub fn new(source: XyzTileSource) -> Self {
        Self::with_cache_dir(source, Self::default_cache_dir())
    }

    pub fn with_cache_dir(source: XyzTileSource, cache_dir: PathBuf) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!("Failed to create tile cache directory {}: {}", cache_dir.display(), e);
        }

        Self::cleanup_old_tiles(&cache_dir);

        Self {
            source: Arc::new(source),
            cache_dir,
            tiles: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn default_cache_dir() -> PathBuf {
        let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache"));
        path.push("daynight-desktop");
        path.push("tiles");
        path
    }

    pub fn source(&self) -> &XyzTileSource {
        &self.source
    }

    fn cleanup_old_tiles(cache_dir: &Path) {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(CACHE_DURATION_DAYS * 24 * 60 * 60);

        let Ok(entries) = fs::read_dir(cache_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);
            if expired {
                match fs::remove_file(entry.path()) {
                    Ok(()) => debug!("Removed old tile cache: {}", entry.path().display()),
                    Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
                }
            }
        }
    }

    /// Cache file for a tile, keyed by a hash of its URL.
    fn cache_path(&self, coord: TileCoord) -> PathBuf {
        let url = self.source.tile_url(coord.tile_id());
        let hash = Sha256::digest(url.as_bytes());
        self.cache_dir.join(format!("{hash:x}.png"))
    }

    /// Get tile from cache or queue for download
    pub fn get_tile(&self, coord: TileCoord, ctx: &egui::Context) -> Option<TextureHandle> {
        let mut tiles = lock(&self.tiles);

        match tiles.get(&coord) {
            Some(TileState::Loaded(texture)) => Some(texture.clone()),
            Some(TileState::Loading | TileState::Failed) => None,
            None => {
                let cache_path = self.cache_path(coord);
                if cache_path.exists() {
                    match load_texture_from_disk(&cache_path, ctx, coord) {
                        Ok(texture) => {
                            tiles.insert(coord, TileState::Loaded(texture.clone()));
                            return Some(texture);
                        }
                        Err(e) => warn!("Failed to load cached tile {}: {}", cache_path.display(), e),
                    }
                }
                tiles.insert(coord, TileState::Loading);
                drop(tiles);
                self.queue_download(coord, ctx.clone());
                None
            }
        }
    }

    fn queue_download(&self, coord: TileCoord, ctx: egui::Context) {
        if !lock(&self.in_flight).insert(coord) {
            return;
        }

        let url = self.source.tile_url(coord.tile_id());
        let cache_path = self.cache_path(coord);
        let tiles = Arc::clone(&self.tiles);
        let in_flight = Arc::clone(&self.in_flight);

        std::thread::spawn(move || {
            let state = match download_tile(&url, &cache_path, &ctx, coord) {
                Ok(texture) => TileState::Loaded(texture),
                Err(e) => {
                    warn!("Tile {} failed: {}", url, e);
                    TileState::Failed
                }
            };
            lock(&tiles).insert(coord, state);
            lock(&in_flight).remove(&coord);
            ctx.request_repaint();
        });
    }

    /// Tiles covering a viewport centered on `center`.
    ///
    /// `tile_pixels` is the on-screen size of one tile, which differs from
    /// [`TILE_SIZE`] at fractional zoom levels.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "tile indices are bounded by 2^zoom"
    )]
    pub fn visible_tiles(
        center: LonLat,
        zoom: u8,
        viewport_width: f32,
        viewport_height: f32,
        tile_pixels: f32,
    ) -> Vec<PlacedTile> {
        let mut placed = Vec::new();

        let n = 2_f64.powi(i32::from(zoom));
        let (world_x, world_y) = WebMercator::to_world(center);
        let center_tile_x = world_x * n;
        let center_tile_y = world_y * n;

        let tiles_wide = (viewport_width / tile_pixels).ceil() as i32 + 2;
        let tiles_high = (viewport_height / tile_pixels).ceil() as i32 + 2;

        let start_x = center_tile_x.floor() as i32 - tiles_wide / 2;
        let start_y = center_tile_y.floor() as i32 - tiles_high / 2;

        let max_tile = 1_i32 << zoom;

        for dy in 0..tiles_high {
            for dx in 0..tiles_wide {
                let tile_x = start_x + dx;
                let tile_y = start_y + dy;

                // Longitude wraps, latitude doesn't
                if tile_y < 0 || tile_y >= max_tile {
                    continue;
                }
                let wrapped_x = tile_x.rem_euclid(max_tile);

                placed.push(PlacedTile {
                    coord: TileCoord::new(wrapped_x as u32, tile_y as u32, zoom),
                    offset_x: ((f64::from(tile_x) - center_tile_x) * f64::from(tile_pixels)) as f32,
                    offset_y: ((f64::from(tile_y) - center_tile_y) * f64::from(tile_pixels)) as f32,
                });
            }
        }

        placed
    }

    pub fn has_loading_tiles(&self) -> bool {
        lock(&self.tiles)
            .values()
            .any(|state| matches!(state, TileState::Loading))
    }

    pub fn error_count(&self) -> usize {
        lock(&self.tiles)
            .values()
            .filter(|state| matches!(state, TileState::Failed))
            .count()
    }
}

fn fetch_tile(url: &str) -> Result<Vec<u8>, TileError> {
    debug!("Downloading tile: {}", url);
    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .user_agent(concat!("daynight-desktop/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let response = client.get(url).send()?;
    if !response.status().is_success() {
        return Err(TileError::Status(response.status()));
    }
    Ok(response.bytes()?.to_vec())
}

fn download_tile(
    url: &str,
    cache_path: &Path,
    ctx: &egui::Context,
    coord: TileCoord,
) -> Result<TextureHandle, TileError> {
    let bytes = fetch_tile(url)?;
    let image = decode_tile(&bytes)?;

    if let Err(e) = fs::write(cache_path, &bytes) {
        warn!("Failed to save tile to cache: {}", e);
    }

    Ok(ctx.load_texture(coord.texture_name(), image, egui::TextureOptions::default()))
}

fn load_texture_from_disk(
    path: &Path,
    ctx: &egui::Context,
    coord: TileCoord,
) -> Result<TextureHandle, TileError> {
    let bytes = fs::read(path)?;
    let image = decode_tile(&bytes)?;
    debug!("Loaded tile {:?} from cache", coord);
    Ok(ctx.load_texture(coord.texture_name(), image, egui::TextureOptions::default()))
}

/// Decode PNG/JPEG tile bytes into an egui image.
pub fn decode_tile(bytes: &[u8]) -> Result<ColorImage, TileError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, &rgba.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use daynight::BaseLayer;
    use std::io::Cursor;

    fn manager(dir: &Path) -> TileManager {
        TileManager::with_cache_dir(XyzTileSource::new(BaseLayer::default()), dir.to_path_buf())
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_visible_tiles_at_zoom_zero() {
        let tiles = TileManager::visible_tiles(LonLat::new(0.0, 0.0), 0, 800.0, 600.0, TILE_SIZE);
        assert!(!tiles.is_empty());
        assert!(tiles.iter().all(|t| t.coord == TileCoord::new(0, 0, 0)));
    }

    #[test]
    fn test_visible_tiles_wrap_longitude() {
        let tiles = TileManager::visible_tiles(LonLat::new(179.9, 0.0), 3, 1024.0, 512.0, TILE_SIZE);
        let xs: HashSet<u32> = tiles.iter().map(|t| t.coord.x).collect();
        assert!(xs.contains(&7));
        assert!(xs.contains(&0), "tiles east of the antimeridian wrap to column 0");
        assert!(tiles.iter().all(|t| t.coord.x < 8 && t.coord.y < 8));
    }

    #[test]
    fn test_center_tile_offset() {
        // Center exactly on the corner shared by four tiles at zoom 1
        let tiles = TileManager::visible_tiles(LonLat::new(0.0, 0.0), 1, 256.0, 256.0, TILE_SIZE);
        let south_east = tiles
            .iter()
            .find(|t| t.coord == TileCoord::new(1, 1, 1) && t.offset_x >= 0.0)
            .unwrap();
        assert!(south_east.offset_x.abs() < 1e-3);
        assert!(south_east.offset_y.abs() < 1e-3);
    }

    #[test]
    fn test_fractional_zoom_scales_offsets() {
        let full = TileManager::visible_tiles(LonLat::new(10.0, 10.0), 4, 512.0, 512.0, TILE_SIZE);
        let half = TileManager::visible_tiles(LonLat::new(10.0, 10.0), 4, 512.0, 512.0, TILE_SIZE * 1.5);
        let a = full.iter().find(|t| t.coord == TileCoord::new(8, 7, 4)).unwrap();
        let b = half.iter().find(|t| t.coord == TileCoord::new(8, 7, 4)).unwrap();
        assert!((b.offset_x - a.offset_x * 1.5).abs() < 1e-2);
    }

    #[test]
    fn test_cache_path_is_stable_per_tile() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let a = manager.cache_path(TileCoord::new(1, 2, 3));
        let b = manager.cache_path(TileCoord::new(1, 2, 3));
        let c = manager.cache_path(TileCoord::new(2, 1, 3));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with(dir.path()));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("png"));
    }

    #[test]
    fn test_cleanup_keeps_fresh_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("fresh.png");
        fs::write(&fresh, png_bytes(1, 1)).unwrap();
        let _manager = manager(dir.path());
        assert!(fresh.exists());
    }

    #[test]
    fn test_decode_tile_keeps_dimensions() {
        let image = decode_tile(&png_bytes(256, 256)).unwrap();
        assert_eq!(image.size, [256, 256]);
    }

    #[test]
    fn test_decode_tile_rejects_garbage() {
        let err = decode_tile(b"<html>503 Service Unavailable</html>").unwrap_err();
        assert!(matches!(err, TileError::Decode(_)));
    }

    #[test]
    fn test_new_manager_reports_no_errors() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        assert_eq!(manager.error_count(), 0);
        assert!(!manager.has_loading_tiles());
    }
}
