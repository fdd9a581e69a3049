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

use daynight::{BaseLayer, DEFAULT_TILE_URL};
use walkers::sources::{Attribution, TileSource};
use walkers::TileId;

/// Tile source for any XYZ service described by a URL template
/// (`{z}`, `{x}`, `{y}` placeholders).
#[derive(Debug, Clone)]
pub struct XyzTileSource {
    layer: BaseLayer,
}

impl XyzTileSource {
    pub fn new(layer: BaseLayer) -> Self {
        Self { layer }
    }

    /// Whether this is the stock ArcGIS World Topo basemap
    fn is_arcgis_topo(&self) -> bool {
        self.layer.url_template == DEFAULT_TILE_URL
    }
}

impl TileSource for XyzTileSource {
    fn tile_url(&self, tile_id: TileId) -> String {
        self.layer.tile_url(tile_id.zoom, tile_id.x, tile_id.y)
    }

    fn attribution(&self) -> Attribution {
        if self.is_arcgis_topo() {
            Attribution {
                text: "Tiles © Esri",
                url: "https://www.arcgis.com/home/item.html?id=30e5fe3149c34df1ba922e6f5bbf808f",
                logo_light: None,
                logo_dark: None,
            }
        } else {
            Attribution {
                text: "Custom tile service",
                url: "https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames",
                logo_light: None,
                logo_dark: None,
            }
        }
    }

    // tile_size() and max_zoom() use the trait defaults
}
