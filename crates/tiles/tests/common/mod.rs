#![allow(dead_code)]

use bevy_math::DVec2;
use futures::{
    FutureExt,
    channel::oneshot,
    future::{self, BoxFuture},
};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use tessera_async::AsyncSystem;
use tessera_geometry::QuadtreeTileId;
use tessera_geospatial::{Cartographic, Ellipsoid};
use tessera_gltf::{AccessorType, BufferTarget, ComponentType, Mesh, MeshPrimitive, Model, Z_UP_TO_Y_UP};
use tessera_tiles::{
    AssetAccessor, AssetResponse, ImageAsset, ImageDecoder, ImageReaderResult, PrepareRendererResources,
    RasterOverlayTile, RendererResources, Tile, TilesExternals, TilesResult,
};

/// Serves `tiles/{z}/{x}/{y}` from memory. The body is a single byte
/// identifying the tile, see [`tile_value`].
#[derive(Default)]
pub struct TileServer {
    requests: Mutex<HashMap<String, usize>>,
    missing: Mutex<HashSet<String>>,
    holding: Mutex<bool>,
    held: Mutex<Vec<(String, oneshot::Sender<TilesResult<AssetResponse>>)>>,
}

impl TileServer {
    pub fn requests(&self, url: &str) -> usize {
        self.requests.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().values().sum()
    }

    pub fn remove(&self, url: &str) {
        self.missing.lock().insert(url.to_string());
    }

    /// Keeps responses back until [`Self::release`].
    pub fn hold(&self) {
        *self.holding.lock() = true;
    }

    pub fn release(&self) {
        *self.holding.lock() = false;
        for (url, sender) in self.held.lock().drain(..) {
            let _ = sender.send(Ok(self.respond(&url)));
        }
    }

    fn respond(&self, url: &str) -> AssetResponse {
        if self.missing.lock().contains(url) {
            return AssetResponse::new(404, "text/plain", Vec::new());
        }

        let parts = url
            .trim_start_matches("tiles/")
            .split('/')
            .filter_map(|part| part.parse::<u32>().ok())
            .collect::<Vec<_>>();
        match parts.as_slice() {
            &[level, x, y] => AssetResponse::new(200, "image/raw", vec![tile_value(QuadtreeTileId::new(level, x, y))]),
            _ => AssetResponse::new(404, "text/plain", Vec::new()),
        }
    }
}

pub fn tile_value(tile_id: QuadtreeTileId) -> u8 {
    (tile_id.level * 64 + tile_id.y * 8 + tile_id.x + 1) as u8
}

pub struct SharedServer(pub Arc<TileServer>);

impl AssetAccessor for SharedServer {
    fn get(&self, url: &str, _headers: &[(String, String)]) -> BoxFuture<'static, TilesResult<AssetResponse>> {
        *self.0.requests.lock().entry(url.to_string()).or_default() += 1;

        if *self.0.holding.lock() {
            let (sender, receiver) = oneshot::channel();
            self.0.held.lock().push((url.to_string(), sender));
            return receiver
                .map(|response| response.unwrap_or_else(|_| Ok(AssetResponse::new(500, "text/plain", Vec::new()))))
                .boxed();
        }

        future::ready(Ok(self.0.respond(url))).boxed()
    }
}

/// Turns the single byte body into an opaque 2x2 image of that value.
pub struct ValueDecoder;

impl ImageDecoder for ValueDecoder {
    fn decode(&self, data: &[u8]) -> ImageReaderResult {
        let pixel = [data[0], data[0], data[0], 255];
        ImageReaderResult {
            image: Some(ImageAsset::new(2, 2, 4, 1, pixel.repeat(4))),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RendererEvent {
    PrepareInLoadThread,
    PrepareInMainThread(QuadtreeTileId),
    Free(QuadtreeTileId),
    Attach {
        tile_id: QuadtreeTileId,
        texture_coordinate_id: u32,
        translation: DVec2,
        scale: DVec2,
    },
    Detach(QuadtreeTileId),
}

#[derive(Default)]
pub struct RecordingRenderer {
    pub events: Mutex<Vec<RendererEvent>>,
}

impl RecordingRenderer {
    pub fn events(&self) -> Vec<RendererEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&RendererEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| matches(event)).count()
    }
}

pub struct SharedRenderer(pub Arc<RecordingRenderer>);

impl PrepareRendererResources for SharedRenderer {
    fn prepare_raster_in_load_thread(&self, image: &ImageAsset) -> Option<RendererResources> {
        self.0.events.lock().push(RendererEvent::PrepareInLoadThread);
        Some(Box::new(image.width))
    }

    fn prepare_raster_in_main_thread(
        &self,
        raster_tile: &RasterOverlayTile,
        load_thread_result: Option<RendererResources>,
    ) -> Option<RendererResources> {
        self.0
            .events
            .lock()
            .push(RendererEvent::PrepareInMainThread(raster_tile.id()));
        load_thread_result
    }

    fn free_raster(
        &self,
        raster_tile: &RasterOverlayTile,
        _load_thread_result: Option<RendererResources>,
        _main_thread_result: Option<RendererResources>,
    ) {
        self.0.events.lock().push(RendererEvent::Free(raster_tile.id()));
    }

    fn attach_raster_in_main_thread(
        &self,
        _tile: &Tile,
        overlay_texture_coordinate_id: u32,
        raster_tile: &RasterOverlayTile,
        translation: DVec2,
        scale: DVec2,
    ) {
        self.0.events.lock().push(RendererEvent::Attach {
            tile_id: raster_tile.id(),
            texture_coordinate_id: overlay_texture_coordinate_id,
            translation,
            scale,
        });
    }

    fn detach_raster_in_main_thread(&self, _tile: &Tile, _overlay_texture_coordinate_id: u32, raster_tile: &RasterOverlayTile) {
        self.0.events.lock().push(RendererEvent::Detach(raster_tile.id()));
    }
}

pub struct Harness {
    pub async_system: AsyncSystem,
    pub server: Arc<TileServer>,
    pub renderer: Arc<RecordingRenderer>,
    pub externals: TilesExternals,
}

impl Harness {
    pub fn new() -> Self {
        let async_system = AsyncSystem::new(2);
        let server = Arc::new(TileServer::default());
        let renderer = Arc::new(RecordingRenderer::default());
        let externals = TilesExternals::new(async_system.clone(), Arc::new(SharedServer(server.clone())))
            .with_image_decoder(Arc::new(ValueDecoder))
            .with_prepare_renderer_resources(Arc::new(SharedRenderer(renderer.clone())));

        Self {
            async_system,
            server,
            renderer,
            externals,
        }
    }

    /// Dispatches main thread tasks until `done` holds.
    pub fn pump_until(&self, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting on the worker threads");
            if self.async_system.dispatch_main_thread_tasks() == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }
}

/// Two triangles on the ellipsoid spanning the given degrees, stored y up
/// as glTF content is.
pub fn surface_quad(west: f64, south: f64, east: f64, north: f64) -> Model {
    let positions = [(west, south), (east, south), (east, north), (west, north)]
        .map(|(longitude, latitude)| {
            let ecef = Ellipsoid::WGS84.cartographic_to_cartesian(&Cartographic::from_degrees(longitude, latitude, 0.0));
            Z_UP_TO_Y_UP.transform_point3(ecef).as_vec3().to_array()
        });
    let indices: [u32; 6] = [0, 1, 2, 0, 2, 3];

    let mut model = Model::default();
    let position_accessor = model.add_accessor_with_buffer(
        bytemuck::cast_slice(&positions).to_vec(),
        ComponentType::Float,
        AccessorType::Vec3,
        positions.len(),
        Some(BufferTarget::ArrayBuffer),
    );
    let index_accessor = model.add_accessor_with_buffer(
        bytemuck::cast_slice(&indices).to_vec(),
        ComponentType::UnsignedInt,
        AccessorType::Scalar,
        indices.len(),
        Some(BufferTarget::ElementArrayBuffer),
    );

    let mut primitive = MeshPrimitive {
        indices: Some(index_accessor),
        ..Default::default()
    };
    primitive.attributes.insert("POSITION".to_string(), position_accessor);
    model.meshes.push(Mesh {
        primitives: vec![primitive],
    });
    model
}
