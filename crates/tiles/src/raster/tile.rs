use crate::{Credit, ImageAsset, PrepareRendererResources, RendererResources, TilesError, TilesResult};
use bevy_log::error;
use parking_lot::RwLock;
use std::{
    fmt,
    ops::Deref,
    sync::{
        Arc,
        atomic::{AtomicI8, AtomicU32, Ordering},
    },
};
use tessera_geometry::{QuadtreeTileId, Rectangle};

/// Where a [`RasterOverlayTile`] is in its life.
///
/// Negative states are terminal, the tile will never hold an image.
#[repr(i8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RasterTileLoadState {
    /// Removed from its provider, a load still in flight is dropped when it
    /// completes.
    Destroying = -3,
    /// Stands in for tiles of an overlay whose provider is not ready yet.
    Placeholder = -2,
    Failed = -1,
    Unloaded = 0,
    Loading = 1,
    /// The image and the load thread resources are ready, the main thread
    /// part of the renderer preparation has not run yet.
    Loaded = 2,
    Done = 3,
}

impl RasterTileLoadState {
    const fn from_i8(value: i8) -> Self {
        match value {
            -3 => Self::Destroying,
            -2 => Self::Placeholder,
            -1 => Self::Failed,
            1 => Self::Loading,
            2 => Self::Loaded,
            3 => Self::Done,
            _ => Self::Unloaded,
        }
    }

    /// Loaded or further along.
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded | Self::Done)
    }
}

#[derive(Default)]
pub(crate) struct RasterTileData {
    pub(crate) image: Option<Arc<ImageAsset>>,
    /// The projected area the image covers, which may exceed the tile.
    pub(crate) image_rectangle: Option<Rectangle>,
    pub(crate) credits: Vec<Credit>,
    pub(crate) load_thread_resources: Option<RendererResources>,
    pub(crate) renderer_resources: Option<RendererResources>,
    pub(crate) more_detail_available: bool,
}

/// One tile of a raster overlay, shared by every geometry tile it is
/// draped over.
///
/// The provider owns the tile, geometry tiles hold counted references
/// through [`RasterTileRef`]. A tile whose count dropped to zero stays
/// alive until its provider collects it.
pub struct RasterOverlayTile {
    id: QuadtreeTileId,
    rectangle: Rectangle,
    state: AtomicI8,
    references: AtomicU32,
    data: RwLock<RasterTileData>,
}

impl RasterOverlayTile {
    pub fn new(id: QuadtreeTileId, rectangle: Rectangle) -> Self {
        Self::with_state(id, rectangle, RasterTileLoadState::Unloaded)
    }

    pub fn placeholder() -> Self {
        Self::with_state(
            QuadtreeTileId::default(),
            Rectangle::new(0.0, 0.0, 0.0, 0.0),
            RasterTileLoadState::Placeholder,
        )
    }

    fn with_state(id: QuadtreeTileId, rectangle: Rectangle, state: RasterTileLoadState) -> Self {
        Self {
            id,
            rectangle,
            state: AtomicI8::new(state as i8),
            references: AtomicU32::new(0),
            data: RwLock::new(RasterTileData::default()),
        }
    }

    pub fn id(&self) -> QuadtreeTileId {
        self.id
    }

    /// The projected area of the tile in its overlay's projection.
    pub fn rectangle(&self) -> &Rectangle {
        &self.rectangle
    }

    pub fn state(&self) -> RasterTileLoadState {
        RasterTileLoadState::from_i8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: RasterTileLoadState) {
        self.state.store(state as i8, Ordering::Release);
    }

    /// Moves an unloaded tile to loading. Only one caller wins.
    pub(crate) fn try_begin_loading(&self) -> bool {
        self.state
            .compare_exchange(
                RasterTileLoadState::Unloaded as i8,
                RasterTileLoadState::Loading as i8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn reference_count(&self) -> u32 {
        self.references.load(Ordering::Acquire)
    }

    pub fn add_reference(&self) -> u32 {
        self.references.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the remaining count. Releasing an unreferenced tile leaves
    /// the count at zero and reports the imbalance.
    pub fn release_reference(&self) -> TilesResult<u32> {
        let released = self
            .references
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1));

        match released {
            Ok(previous) => Ok(previous - 1),
            Err(_) => {
                let error = TilesError::ReferenceUnderflow(self.id);
                error!("{error}");
                Err(error)
            }
        }
    }

    pub fn image(&self) -> Option<Arc<ImageAsset>> {
        self.data.read().image.clone()
    }

    pub fn image_rectangle(&self) -> Option<Rectangle> {
        self.data.read().image_rectangle
    }

    pub fn credits(&self) -> Vec<Credit> {
        self.data.read().credits.clone()
    }

    /// Whether the source has finer imagery below this tile.
    pub fn more_detail_available(&self) -> bool {
        self.data.read().more_detail_available
    }

    pub fn with_renderer_resources<R>(&self, f: impl FnOnce(Option<&RendererResources>) -> R) -> R {
        f(self.data.read().renderer_resources.as_ref())
    }

    pub fn byte_size(&self) -> usize {
        self.data.read().image.as_ref().map_or(0, |image| image.byte_size())
    }

    pub(crate) fn store(&self, data: RasterTileData) {
        *self.data.write() = data;
    }

    /// Empties the tile, returning the load thread and main thread renderer
    /// resources.
    pub(crate) fn take_resources(&self) -> (Option<RendererResources>, Option<RendererResources>) {
        let mut data = self.data.write();
        data.image = None;
        (data.load_thread_resources.take(), data.renderer_resources.take())
    }

    /// Finishes renderer preparation of a loaded tile. Does nothing in any
    /// other state. Returns whether the tile is done.
    pub fn load_in_main_thread(&self, prepare: Option<&dyn PrepareRendererResources>) -> bool {
        match self.state() {
            RasterTileLoadState::Done => return true,
            RasterTileLoadState::Loaded => {}
            _ => return false,
        }

        let load_thread_resources = self.data.write().load_thread_resources.take();
        let renderer_resources = match prepare {
            Some(prepare) => prepare.prepare_raster_in_main_thread(self, load_thread_resources),
            None => load_thread_resources,
        };
        self.data.write().renderer_resources = renderer_resources;
        self.set_state(RasterTileLoadState::Done);
        true
    }
}

impl fmt::Debug for RasterOverlayTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterOverlayTile")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("references", &self.reference_count())
            .finish()
    }
}

/// A counted reference to a [`RasterOverlayTile`], released when dropped.
pub struct RasterTileRef(Arc<RasterOverlayTile>);

impl RasterTileRef {
    pub fn new(tile: Arc<RasterOverlayTile>) -> Self {
        tile.add_reference();
        Self(tile)
    }

    pub fn as_arc(&self) -> &Arc<RasterOverlayTile> {
        &self.0
    }

    pub fn ptr_eq(&self, other: &RasterTileRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Clone for RasterTileRef {
    fn clone(&self) -> Self {
        Self::new(self.0.clone())
    }
}

impl Drop for RasterTileRef {
    fn drop(&mut self) {
        // Underflow is logged by the tile.
        let _ = self.0.release_reference();
    }
}

impl Deref for RasterTileRef {
    type Target = RasterOverlayTile;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for RasterTileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
