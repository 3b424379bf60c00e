use crate::{
    ImageAsset, ImageCrateDecoder, ImageDecoder, RasterOverlayTile, Tile, TilesResult,
};
use bevy_math::DVec2;
use futures::future::BoxFuture;
use std::{
    any::Any,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tessera_async::AsyncSystem;

/// A completed request, whatever its status code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetResponse {
    pub status_code: u16,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub data: Vec<u8>,
}

impl AssetResponse {
    pub fn new(status_code: u16, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            status_code,
            content_type: content_type.into(),
            headers: Vec::new(),
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Fetches the bytes behind a URL.
///
/// An `Err` means no response was received at all. Retrying is up to the
/// implementation.
pub trait AssetAccessor: Send + Sync + 'static {
    fn get(&self, url: &str, headers: &[(String, String)]) -> BoxFuture<'static, TilesResult<AssetResponse>>;
}

/// Serves `file://` URLs and paths relative to a root directory.
#[derive(Clone)]
pub struct FileAssetAccessor {
    root: PathBuf,
    async_system: AsyncSystem,
}

impl FileAssetAccessor {
    pub fn new(root: impl Into<PathBuf>, async_system: AsyncSystem) -> Self {
        Self {
            root: root.into(),
            async_system,
        }
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|extension| extension.to_str()) {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

impl AssetAccessor for FileAssetAccessor {
    fn get(&self, url: &str, _headers: &[(String, String)]) -> BoxFuture<'static, TilesResult<AssetResponse>> {
        let path = self.resolve(url);
        self.async_system.run_in_worker_thread(move || match fs::read(&path) {
            Ok(data) => Ok(AssetResponse::new(200, content_type(&path), data)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                Ok(AssetResponse::new(404, "text/plain", Vec::new()))
            }
            Err(error) => Err(error.into()),
        })
    }
}

/// Whatever the renderer creates for a raster tile, opaque to the tiles crate.
pub type RendererResources = Box<dyn Any + Send + Sync>;

/// Hooks for turning raster tiles into renderer resources.
///
/// Only [`Self::prepare_raster_in_load_thread`] runs on worker threads,
/// everything else runs on the thread dispatching main thread tasks.
pub trait PrepareRendererResources: Send + Sync + 'static {
    fn prepare_raster_in_load_thread(&self, image: &ImageAsset) -> Option<RendererResources>;

    fn prepare_raster_in_main_thread(
        &self,
        raster_tile: &RasterOverlayTile,
        load_thread_result: Option<RendererResources>,
    ) -> Option<RendererResources>;

    /// Either result may be absent, depending on how far the tile got.
    fn free_raster(
        &self,
        raster_tile: &RasterOverlayTile,
        load_thread_result: Option<RendererResources>,
        main_thread_result: Option<RendererResources>,
    );

    /// Shows `raster_tile` on `tile`, sampled with the texture coordinates
    /// `_TESSERA_OVERLAY_<overlay_texture_coordinate_id>` transformed by
    /// `translation` and `scale`.
    fn attach_raster_in_main_thread(
        &self,
        tile: &Tile,
        overlay_texture_coordinate_id: u32,
        raster_tile: &RasterOverlayTile,
        translation: DVec2,
        scale: DVec2,
    );

    fn detach_raster_in_main_thread(
        &self,
        tile: &Tile,
        overlay_texture_coordinate_id: u32,
        raster_tile: &RasterOverlayTile,
    );
}

/// The collaborators tiles and raster overlays load through.
#[derive(Clone)]
pub struct TilesExternals {
    pub async_system: AsyncSystem,
    pub asset_accessor: Arc<dyn AssetAccessor>,
    pub image_decoder: Arc<dyn ImageDecoder>,
    pub prepare_renderer_resources: Option<Arc<dyn PrepareRendererResources>>,
}

impl TilesExternals {
    pub fn new(async_system: AsyncSystem, asset_accessor: Arc<dyn AssetAccessor>) -> Self {
        Self {
            async_system,
            asset_accessor,
            image_decoder: Arc::new(ImageCrateDecoder),
            prepare_renderer_resources: None,
        }
    }

    pub fn with_image_decoder(mut self, image_decoder: Arc<dyn ImageDecoder>) -> Self {
        self.image_decoder = image_decoder;
        self
    }

    pub fn with_prepare_renderer_resources(
        mut self,
        prepare_renderer_resources: Arc<dyn PrepareRendererResources>,
    ) -> Self {
        self.prepare_renderer_resources = Some(prepare_renderer_resources);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn serves_files() {
        let async_system = AsyncSystem::new(1);
        let root = env::temp_dir().join(format!("tessera_assets_{}", std::process::id()));
        fs::create_dir_all(root.join("0/0")).unwrap();
        fs::write(root.join("0/0/0.png"), [1, 2, 3]).unwrap();

        let accessor = FileAssetAccessor::new(&root, async_system.clone());
        let found = async_system.wait_in_main_thread(accessor.get("0/0/0.png", &[])).unwrap();
        assert!(found.is_success());
        assert_eq!(found.content_type, "image/png");
        assert_eq!(found.data, vec![1, 2, 3]);

        let url = format!("file://{}", root.join("0/0/0.png").display());
        assert_eq!(accessor.resolve(&url), root.join("0/0/0.png"));

        let missing = async_system.wait_in_main_thread(accessor.get("1/0/0.png", &[])).unwrap();
        assert_eq!(missing.status_code, 404);
        assert!(!missing.is_success());

        fs::remove_dir_all(&root).unwrap();
    }
}
