//! Fixed-size tensor arena and its allocation plan.

use std::ops::Range;

use crate::{Error, Result};

/// Caller-sized scratch memory shared by every tensor of a model.
///
/// The arena never grows; [`ArenaPlan`] decides where each tensor lives.
pub struct TensorArena {
    buf: Box<[u8]>,
}

impl TensorArena {
    /// Allocates a zeroed arena of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0; size].into_boxed_slice(),
        }
    }

    /// Arena capacity in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn region(&self, range: Range<usize>) -> &[u8] {
        &self.buf[range]
    }

    pub fn region_mut(&mut self, range: Range<usize>) -> &mut [u8] {
        &mut self.buf[range]
    }
}

/// Byte ranges of the tensors inside an arena.
///
/// Layout is `[input | output | activation scratch]`. Only the input and
/// output ranges hold data. Activations live in backend tensors, so
/// `scratch` reserves their peak footprint as a budget without ever being
/// written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaPlan {
    pub input: Range<usize>,
    pub output: Range<usize>,
    pub scratch: Range<usize>,
}

impl ArenaPlan {
    /// Lays out the tensors, failing when they exceed `available` bytes.
    pub fn new(
        input_bytes: usize,
        output_bytes: usize,
        scratch_bytes: usize,
        available: usize,
    ) -> Result<Self> {
        let input = 0..input_bytes;
        let output = input.end..input.end + output_bytes;
        let scratch = output.end..output.end + scratch_bytes;

        if scratch.end > available {
            return Err(Error::ArenaTooSmall {
                required: scratch.end,
                available,
            });
        }

        Ok(Self {
            input,
            output,
            scratch,
        })
    }

    /// Total bytes the plan occupies.
    pub fn required(&self) -> usize {
        self.scratch.end
    }
}
