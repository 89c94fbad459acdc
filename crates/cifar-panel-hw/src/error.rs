//! Error types for the CIFAR Panel hardware library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when driving the panel.
#[derive(Error, Debug)]
pub enum Error {
    /// A draw call was issued before `initialize`.
    #[error("Panel has not been initialized")]
    NotInitialized,

    /// `initialize` was called a second time.
    #[error("Panel is already initialized")]
    AlreadyInitialized,

    /// Invalid orientation value.
    #[error("Invalid orientation: {0}")]
    InvalidOrientation(String),

    /// Image buffer does not match the declared dimensions.
    #[error("Image size mismatch: expected {expected} bytes, got {actual}")]
    ImageSize { expected: usize, actual: usize },

    /// Snapshot file I/O error.
    #[error("Snapshot I/O error: {0}")]
    SnapshotIo(#[from] std::io::Error),

    /// PNG encoding error.
    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),
}
