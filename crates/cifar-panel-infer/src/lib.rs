//! CIFAR Panel Inference Library
//!
//! Drives a small CIFAR-10 convolutional classifier through the `burn`
//! runtime. The model ships as a version-tagged container; input and output
//! tensors live in a caller-sized arena that is planned once and reused for
//! every invocation.

pub mod arena;
pub mod error;
pub mod interpreter;
pub mod model;
pub mod network;

pub use arena::{ArenaPlan, TensorArena};
pub use error::{Error, Result};
pub use interpreter::Interpreter;
pub use model::{export_model, ElementType, Model, ModelHeader};
pub use network::{CifarNet, CifarNetConfig};

/// CPU backend used by the binary.
pub type CpuBackend = burn::backend::NdArray<f32>;

/// Model schema version this runtime understands.
pub const SCHEMA_VERSION: u32 = 3;

/// Default tensor arena size (63 KiB).
pub const DEFAULT_ARENA_SIZE: usize = 63 * 1024;

/// Side length of the square input image.
pub const IMAGE_SIZE: usize = 32;

/// Color channels per input pixel.
pub const IMAGE_CHANNELS: usize = 3;

/// Bytes in one interleaved RGB input image.
pub const IMAGE_BYTES: usize = IMAGE_SIZE * IMAGE_SIZE * IMAGE_CHANNELS;

/// Number of output classes.
pub const NUM_CLASSES: usize = 10;
