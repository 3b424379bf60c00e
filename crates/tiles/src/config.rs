use crate::TilesResult;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tessera_geometry::{QuadtreeTilingScheme, Rectangle};
use tessera_geospatial::{GlobeRectangle, Projection, ProjectionKind};

/// Limits shared by every tile provider of one raster overlay.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct RasterOverlayOptions {
    /// Throttled loads beyond this count are postponed.
    pub maximum_simultaneous_tile_loads: u32,
    /// Completed source tiles are kept for compositing until they use more
    /// than this many bytes.
    pub sub_tile_cache_bytes: u64,
    /// Coarser levels are chosen when covering a geometry tile would need a
    /// larger texture.
    pub maximum_texture_size: u32,
}

impl Default for RasterOverlayOptions {
    fn default() -> Self {
        Self {
            maximum_simultaneous_tile_loads: 20,
            sub_tile_cache_bytes: 16 * 1024 * 1024,
            maximum_texture_size: 2048,
        }
    }
}

/// A raster overlay served as a quadtree of images behind a URL template.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RasterOverlayConfig {
    pub name: String,
    /// May contain `{z}`, `{x}`, `{y}` and `{reverseY}`.
    pub url_template: String,
    pub projection: ProjectionKind,
    /// Projected extent of the tiling scheme, the whole projection if absent.
    pub rectangle: Option<Rectangle>,
    /// Projected extent that actually holds imagery, the tiling scheme's
    /// rectangle if absent.
    pub coverage_rectangle: Option<Rectangle>,
    pub root_tiles_x: u32,
    pub root_tiles_y: u32,
    pub minimum_level: u32,
    pub maximum_level: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Row zero is the northernmost row, as in most web map services.
    pub flip_y: bool,
    pub credit: Option<String>,
    /// Areas where the overlay is made fully transparent.
    pub cutouts: Vec<GlobeRectangle>,
    pub options: RasterOverlayOptions,
}

impl Default for RasterOverlayConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            url_template: String::new(),
            projection: ProjectionKind::Geographic,
            rectangle: None,
            coverage_rectangle: None,
            root_tiles_x: 2,
            root_tiles_y: 1,
            minimum_level: 0,
            maximum_level: 18,
            tile_width: 256,
            tile_height: 256,
            flip_y: false,
            credit: None,
            cutouts: Vec::new(),
            options: RasterOverlayOptions::default(),
        }
    }
}

impl RasterOverlayConfig {
    pub fn projection(&self) -> Projection {
        Projection::from(self.projection)
    }

    pub fn tiling_scheme(&self) -> QuadtreeTilingScheme {
        let rectangle = self
            .rectangle
            .unwrap_or_else(|| self.projection().maximum_rectangle());
        QuadtreeTilingScheme::new(rectangle, self.root_tiles_x, self.root_tiles_y)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct TilesConfig {
    /// Worker threads of the async system, one less than the available
    /// parallelism if absent.
    pub worker_threads: Option<usize>,
    pub overlays: Vec<RasterOverlayConfig>,
}

impl TilesConfig {
    pub fn add_overlay(&mut self, overlay: RasterOverlayConfig) -> &mut Self {
        self.overlays.push(overlay);
        self
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> TilesResult<Self> {
        let encoded = fs::read_to_string(path)?;
        Ok(ron::from_str(&encoded)?)
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> TilesResult<()> {
        let encoded = ron::ser::to_string_pretty(self, Default::default())?;
        Ok(fs::write(path, encoded)?)
    }
}
