use super::{quadtree::QuadtreeRasterOverlayTileProvider, url_template::UrlTemplateTileLoader};
use crate::{Credit, RasterOverlayConfig, RasterOverlayTileProvider, TilesError, TilesExternals, TilesResult};
use bevy_log::info;
use parking_lot::RwLock;
use std::sync::Arc;

/// A raster overlay as configured, and the provider currently serving it.
///
/// Starts out served by a placeholder provider. Once
/// [`Self::create_tile_provider`] succeeds, geometry tiles mapped to the
/// placeholder are remapped to the real provider on their next update.
pub struct RasterOverlay {
    config: RasterOverlayConfig,
    externals: TilesExternals,
    provider: RwLock<Arc<RasterOverlayTileProvider>>,
}

impl RasterOverlay {
    pub fn new(config: RasterOverlayConfig, externals: TilesExternals) -> Self {
        let placeholder = RasterOverlayTileProvider::placeholder(
            config.name.clone(),
            externals.clone(),
            config.projection(),
            config.options,
        );

        Self {
            config,
            externals,
            provider: RwLock::new(Arc::new(placeholder)),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &RasterOverlayConfig {
        &self.config
    }

    pub fn tile_provider(&self) -> Arc<RasterOverlayTileProvider> {
        self.provider.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        !self.provider.read().is_placeholder()
    }

    /// Builds the real provider and makes it current.
    pub fn create_tile_provider(&self) -> TilesResult<Arc<RasterOverlayTileProvider>> {
        let provider = Arc::new(create_tile_provider(&self.config, &self.externals)?);
        info!("Raster overlay {} is ready", self.config.name);
        *self.provider.write() = provider.clone();
        Ok(provider)
    }
}

/// Builds the provider of a URL-template quadtree overlay.
pub fn create_tile_provider(
    config: &RasterOverlayConfig,
    externals: &TilesExternals,
) -> TilesResult<RasterOverlayTileProvider> {
    let invalid = |reason: &str| TilesError::InvalidOverlay {
        name: config.name.clone(),
        reason: reason.to_string(),
    };

    if config.url_template.is_empty() {
        return Err(invalid("the url template is empty"));
    }
    if config.root_tiles_x == 0 || config.root_tiles_y == 0 {
        return Err(invalid("there must be at least one root tile on each axis"));
    }
    if config.minimum_level > config.maximum_level {
        return Err(invalid("the minimum level exceeds the maximum level"));
    }
    if config.tile_width == 0 || config.tile_height == 0 {
        return Err(invalid("tiles must have a size"));
    }

    let tiling_scheme = config.tiling_scheme();
    let rectangle = tiling_scheme.rectangle();
    if rectangle.width() <= 0.0 || rectangle.height() <= 0.0 {
        return Err(invalid("the tiling scheme rectangle is empty"));
    }
    if config.maximum_level > tiling_scheme.maximum_level() {
        return Err(invalid(&format!(
            "the maximum level exceeds {}, the deepest level the root tiles allow",
            tiling_scheme.maximum_level()
        )));
    }

    let loader = Arc::new(UrlTemplateTileLoader::new(config, externals.clone()));
    let source = QuadtreeRasterOverlayTileProvider::new(config, loader, externals.async_system.clone());
    let coverage_rectangle = *source.coverage_rectangle();

    let mut provider = RasterOverlayTileProvider::new(
        config.name.clone(),
        externals.clone(),
        config.projection(),
        coverage_rectangle,
        config.options,
        source,
    )
    .with_cutouts(config.cutouts.clone());

    if let Some(credit) = &config.credit {
        provider = provider.with_credit(Credit::new(credit.clone(), false));
    }
    Ok(provider)
}
