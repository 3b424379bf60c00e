use tessera_async::AsyncError;
use tessera_geometry::{ParseTileIdError, QuadtreeTileId, availability::SubtreeError};
use tessera_gltf::AccessorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TilesError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),
    #[error("failed to write configuration: {0}")]
    ConfigWrite(#[from] ron::Error),
    #[error(transparent)]
    Accessor(#[from] AccessorError),
    #[error(transparent)]
    Subtree(#[from] SubtreeError),
    #[error(transparent)]
    Async(#[from] AsyncError),
    #[error(transparent)]
    TileId(#[from] ParseTileIdError),
    #[error("request for {url} failed with status code {status}")]
    RequestFailed { url: String, status: u16 },
    #[error("raster tile {0} was released more often than it was referenced")]
    ReferenceUnderflow(QuadtreeTileId),
    #[error("invalid raster overlay {name}: {reason}")]
    InvalidOverlay { name: String, reason: String },
}

pub type TilesResult<T> = Result<T, TilesError>;
