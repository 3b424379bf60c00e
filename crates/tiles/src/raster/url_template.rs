use super::quadtree::QuadtreeTileLoader;
use crate::{Credit, LoadedRasterOverlayImage, RasterOverlayConfig, TilesError, TilesExternals};
use bevy_log::trace;
use futures::{FutureExt, future::BoxFuture};
use tessera_geometry::{QuadtreeTileId, QuadtreeTilingScheme};

/// Loads quadtree tiles from URLs built by filling in a template.
pub struct UrlTemplateTileLoader {
    url_template: String,
    tiling_scheme: QuadtreeTilingScheme,
    maximum_level: u32,
    flip_y: bool,
    credit: Option<Credit>,
    externals: TilesExternals,
}

impl UrlTemplateTileLoader {
    pub fn new(config: &RasterOverlayConfig, externals: TilesExternals) -> Self {
        Self {
            url_template: config.url_template.clone(),
            tiling_scheme: config.tiling_scheme(),
            maximum_level: config.maximum_level,
            flip_y: config.flip_y,
            credit: config.credit.clone().map(|html| Credit::new(html, false)),
            externals,
        }
    }

    /// Rows count up from the south. With `flip_y`, `{y}` counts down from
    /// the north and `{reverseY}` up from the south.
    pub fn tile_url(&self, tile_id: QuadtreeTileId) -> String {
        let reversed = self
            .tiling_scheme
            .number_of_y_tiles_at_level(tile_id.level)
            .map_or(0, |rows| (rows - 1).saturating_sub(tile_id.y));
        let (y, reverse_y) = if self.flip_y {
            (reversed, tile_id.y)
        } else {
            (tile_id.y, reversed)
        };

        self.url_template
            .replace("{z}", &tile_id.level.to_string())
            .replace("{x}", &tile_id.x.to_string())
            .replace("{reverseY}", &reverse_y.to_string())
            .replace("{y}", &y.to_string())
    }
}

impl QuadtreeTileLoader for UrlTemplateTileLoader {
    fn load_quadtree_tile_image(&self, tile_id: QuadtreeTileId) -> BoxFuture<'static, LoadedRasterOverlayImage> {
        let url = self.tile_url(tile_id);
        let rectangle = self.tiling_scheme.tile_to_rectangle(tile_id);
        let request = self.externals.asset_accessor.get(&url, &[]);
        let decoder = self.externals.image_decoder.clone();
        let async_system = self.externals.async_system.clone();
        let credits = self.credit.iter().cloned().collect::<Vec<_>>();
        let more_detail_available = tile_id.level < self.maximum_level;

        async move {
            trace!("Requesting raster tile {tile_id} from {url}");
            let response = match request.await {
                Ok(response) => response,
                Err(error) => return LoadedRasterOverlayImage::failed(rectangle, format!("{url}: {error}")),
            };

            if !response.is_success() {
                let error = TilesError::RequestFailed {
                    url,
                    status: response.status_code,
                };
                return LoadedRasterOverlayImage::failed(rectangle, error.to_string());
            }

            if response.data.is_empty() {
                return LoadedRasterOverlayImage::failed(rectangle, format!("Image response for {url} is empty."));
            }

            let decoded = async_system
                .run_in_worker_thread(move || decoder.decode(&response.data))
                .await;

            LoadedRasterOverlayImage {
                image: decoded.image,
                rectangle,
                credits,
                errors: decoded.errors.into_iter().map(|error| format!("{url}: {error}")).collect(),
                warnings: decoded.warnings.into_iter().map(|warning| format!("{url}: {warning}")).collect(),
                more_detail_available,
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetAccessor, AssetResponse, ImageAsset, ImageDecoder, ImageReaderResult, TilesResult};
    use futures::future;
    use std::sync::Arc;
    use tessera_async::AsyncSystem;

    /// Serves a 1x1 image for `present/...` URLs and 404 for anything else.
    struct MemoryAccessor;

    impl AssetAccessor for MemoryAccessor {
        fn get(&self, url: &str, _headers: &[(String, String)]) -> BoxFuture<'static, TilesResult<AssetResponse>> {
            let response = if url.starts_with("present/") {
                AssetResponse::new(200, "image/raw", vec![1, 2, 3, 4])
            } else if url.starts_with("empty/") {
                AssetResponse::new(200, "image/raw", Vec::new())
            } else {
                AssetResponse::new(404, "text/plain", Vec::new())
            };
            future::ready(Ok(response)).boxed()
        }
    }

    struct RawDecoder;

    impl ImageDecoder for RawDecoder {
        fn decode(&self, data: &[u8]) -> ImageReaderResult {
            ImageReaderResult {
                image: Some(ImageAsset::new(1, 1, 4, 1, data.to_vec())),
                ..Default::default()
            }
        }
    }

    fn loader(url_template: &str, flip_y: bool) -> (AsyncSystem, UrlTemplateTileLoader) {
        let async_system = AsyncSystem::new(1);
        let externals = TilesExternals::new(async_system.clone(), Arc::new(MemoryAccessor))
            .with_image_decoder(Arc::new(RawDecoder));
        let config = RasterOverlayConfig {
            url_template: url_template.to_string(),
            flip_y,
            maximum_level: 3,
            credit: Some("Imagery".to_string()),
            ..Default::default()
        };
        (async_system, UrlTemplateTileLoader::new(&config, externals))
    }

    #[test]
    fn fills_in_the_template() {
        let (_, plain) = loader("tiles/{z}/{x}/{y}-{reverseY}.png", false);
        // Level 1 has two rows.
        assert_eq!(plain.tile_url(QuadtreeTileId::new(1, 3, 0)), "tiles/1/3/0-1.png");

        let (_, flipped) = loader("tiles/{z}/{x}/{y}-{reverseY}.png", true);
        assert_eq!(flipped.tile_url(QuadtreeTileId::new(1, 3, 0)), "tiles/1/3/1-0.png");
    }

    #[test]
    fn loads_and_decodes() {
        let (async_system, present) = loader("present/{z}/{x}/{y}", false);
        let loaded = async_system.wait_in_main_thread(present.load_quadtree_tile_image(QuadtreeTileId::new(2, 1, 1)));

        assert!(loaded.errors.is_empty());
        assert_eq!(loaded.image.map(|image| image.pixel_data), Some(vec![1, 2, 3, 4]));
        assert_eq!(loaded.credits, vec![Credit::new("Imagery", false)]);
        assert!(loaded.more_detail_available);
    }

    #[test]
    fn failed_requests_report_the_url() {
        let (async_system, missing) = loader("missing/{z}/{x}/{y}", false);
        let loaded = async_system.wait_in_main_thread(missing.load_quadtree_tile_image(QuadtreeTileId::new(3, 0, 0)));
        assert!(loaded.image.is_none());
        assert_eq!(
            loaded.errors,
            vec!["request for missing/3/0/0 failed with status code 404".to_string()]
        );
        assert!(!loaded.more_detail_available);

        let (async_system, empty) = loader("empty/{z}/{x}/{y}", false);
        let loaded = async_system.wait_in_main_thread(empty.load_quadtree_tile_image(QuadtreeTileId::new(0, 0, 0)));
        assert_eq!(loaded.errors, vec!["Image response for empty/0/0/0 is empty.".to_string()]);
    }
}
