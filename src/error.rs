use std::collections::TryReserveError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the flat-zone engine. All of these propagate; the
/// library never recovers silently.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("pixel id {pixel} is out of range for a {num_pixels}-pixel image")]
    InvalidPixel { pixel: usize, num_pixels: usize },

    #[error("adjacency radius must be positive, got {radius}")]
    InvalidRadius { radius: f64 },

    #[error("image must have at least one pixel, got {rows}x{cols}")]
    EmptyImage { rows: usize, cols: usize },

    #[error("buffer of length {len} does not fit a {rows}x{cols} image")]
    BufferSizeMismatch { len: usize, rows: usize, cols: usize },

    #[error("adjacency relation is {adj_rows}x{adj_cols} but the image is {rows}x{cols}")]
    DimensionMismatch {
        rows: usize,
        cols: usize,
        adj_rows: usize,
        adj_cols: usize,
    },

    /// The pixel resolves to a retired zone slot. Recoverable: canonicalize
    /// with `find_representative` and retry.
    #[error("representative {rep} refers to a retired zone slot")]
    StaleHandle { rep: usize },

    #[error("merge requires at least one base zone")]
    EmptyBases,

    #[error("allocation failed: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

impl Error {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::StaleHandle { .. })
    }
}
