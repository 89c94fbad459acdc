//! Error types for the inference driver.

use thiserror::Error;

use crate::model::ElementType;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the inference driver.
///
/// The driver never decides whether an error is fatal; callers do.
#[derive(Error, Debug)]
pub enum Error {
    /// Model blob does not start with the container magic.
    #[error("Not a model container (bad magic {0:02X?})")]
    BadMagic([u8; 4]),

    /// Model blob ends before the header does.
    #[error("Model truncated: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    /// Unknown element type tag in the header.
    #[error("Unknown element type tag: {0}")]
    UnknownElementType(u8),

    /// Model schema version differs from the runtime's.
    #[error("Model provided is schema version {found} not equal to supported version {supported}")]
    SchemaMismatch { found: u32, supported: u32 },

    /// Model input tensor has the wrong element type.
    #[error("Wrong input type: expected {expected}, model declares {found}")]
    InputType {
        expected: ElementType,
        found: ElementType,
    },

    /// Model output tensor has the wrong element type.
    #[error("Wrong output type: expected {expected}, model declares {found}")]
    OutputType {
        expected: ElementType,
        found: ElementType,
    },

    /// Model shape differs from what this network can run.
    #[error("Unsupported model shape: {0}")]
    UnsupportedShape(String),

    /// Model weights could not be decoded or encoded.
    #[error("Model record error: {0}")]
    Record(String),

    /// The tensor arena cannot hold the model.
    #[error("Arena too small: model needs {required} bytes, arena has {available}")]
    ArenaTooSmall { required: usize, available: usize },

    /// Tensor access before `allocate_tensors`.
    #[error("Tensors have not been allocated")]
    NotAllocated,

    /// Input buffer length does not match the input tensor.
    #[error("Input size mismatch: expected {expected} bytes, got {actual}")]
    InputSize { expected: usize, actual: usize },

    /// The runtime failed while executing the model.
    #[error("Invoke failed: {0}")]
    Invoke(String),
}
