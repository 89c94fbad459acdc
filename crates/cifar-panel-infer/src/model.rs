//! Model container format.
//!
//! A model file is a fixed 18-byte little-endian header followed by the
//! network weights as a `burn` binary record:
//!
//! ```text
//! 0   magic "CPNM"
//! 4   schema version (u32)
//! 8   input element type
//! 9   output element type
//! 10  input height (u16)
//! 12  input width (u16)
//! 14  input channels (u16)
//! 16  class count (u16)
//! 18  weights
//! ```

use burn::{
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::Backend,
};
use serde::Serialize;

use crate::network::CifarNet;
use crate::{
    Error, Result, IMAGE_CHANNELS, IMAGE_SIZE, NUM_CLASSES, SCHEMA_VERSION,
};

/// Container magic.
pub const MAGIC: [u8; 4] = *b"CPNM";

/// Header length in bytes.
pub const HEADER_LEN: usize = 18;

/// Tensor element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    UInt8,
    Int8,
    Float32,
}

impl ElementType {
    /// Returns the tag stored in the header.
    pub fn tag(&self) -> u8 {
        match self {
            ElementType::UInt8 => 0,
            ElementType::Int8 => 1,
            ElementType::Float32 => 2,
        }
    }

    /// Parses a header tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(ElementType::UInt8),
            1 => Ok(ElementType::Int8),
            2 => Ok(ElementType::Float32),
            other => Err(Error::UnknownElementType(other)),
        }
    }

    /// Bytes per element.
    pub fn size(&self) -> usize {
        match self {
            ElementType::UInt8 | ElementType::Int8 => 1,
            ElementType::Float32 => 4,
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementType::UInt8 => write!(f, "uint8"),
            ElementType::Int8 => write!(f, "int8"),
            ElementType::Float32 => write!(f, "float32"),
        }
    }
}

/// Parsed container header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelHeader {
    pub schema_version: u32,
    pub input_type: ElementType,
    pub output_type: ElementType,
    pub input_height: u16,
    pub input_width: u16,
    pub input_channels: u16,
    pub num_classes: u16,
}

impl ModelHeader {
    /// Header for a 32x32 RGB, 10-class, uint8 quantized classifier.
    pub fn cifar10() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            input_type: ElementType::UInt8,
            output_type: ElementType::UInt8,
            input_height: IMAGE_SIZE as u16,
            input_width: IMAGE_SIZE as u16,
            input_channels: IMAGE_CHANNELS as u16,
            num_classes: NUM_CLASSES as u16,
        }
    }

    /// Number of elements in the input tensor.
    pub fn input_elements(&self) -> usize {
        self.input_height as usize * self.input_width as usize * self.input_channels as usize
    }

    /// Input tensor size in bytes.
    pub fn input_bytes(&self) -> usize {
        self.input_elements() * self.input_type.size()
    }

    /// Output tensor size in bytes.
    pub fn output_bytes(&self) -> usize {
        self.num_classes as usize * self.output_type.size()
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Truncated {
                needed: HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != MAGIC {
            return Err(Error::BadMagic(magic));
        }

        let u16_at = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);

        Ok(Self {
            schema_version: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            input_type: ElementType::from_tag(bytes[8])?,
            output_type: ElementType::from_tag(bytes[9])?,
            input_height: u16_at(10),
            input_width: u16_at(12),
            input_channels: u16_at(14),
            num_classes: u16_at(16),
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.schema_version.to_le_bytes());
        out.push(self.input_type.tag());
        out.push(self.output_type.tag());
        out.extend_from_slice(&self.input_height.to_le_bytes());
        out.extend_from_slice(&self.input_width.to_le_bytes());
        out.extend_from_slice(&self.input_channels.to_le_bytes());
        out.extend_from_slice(&self.num_classes.to_le_bytes());
    }
}

/// A loaded, not yet validated, model.
#[derive(Debug, Clone)]
pub struct Model {
    header: ModelHeader,
    weights: Vec<u8>,
}

impl Model {
    /// Parses a model container.
    ///
    /// Only the framing is checked here. The schema version is validated
    /// separately by [`Model::check_schema`] so the caller can choose whether
    /// a mismatch is fatal.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = ModelHeader::parse(bytes)?;
        Ok(Self {
            header,
            weights: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Creates a model from a header and encoded weights.
    pub fn new(header: ModelHeader, weights: Vec<u8>) -> Self {
        Self { header, weights }
    }

    /// Returns the header.
    pub fn header(&self) -> &ModelHeader {
        &self.header
    }

    /// Returns the encoded weights.
    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    /// Checks the schema version against [`SCHEMA_VERSION`].
    pub fn check_schema(&self) -> Result<()> {
        if self.header.schema_version != SCHEMA_VERSION {
            return Err(Error::SchemaMismatch {
                found: self.header.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    /// Serializes the container.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.weights.len());
        self.header.write(&mut out);
        out.extend_from_slice(&self.weights);
        out
    }
}

/// Encodes a network and header into a model container.
pub fn export_model<B: Backend>(network: CifarNet<B>, header: ModelHeader) -> Result<Vec<u8>> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let weights = recorder
        .record(network.into_record(), ())
        .map_err(|e| Error::Record(format!("{e:?}")))?;
    Ok(Model::new(header, weights).to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(version: u32) -> Vec<u8> {
        let header = ModelHeader {
            schema_version: version,
            ..ModelHeader::cifar10()
        };
        let mut out = Vec::new();
        header.write(&mut out);
        out
    }

    #[test]
    fn test_parse_header() {
        let mut bytes = header_bytes(3);
        bytes.extend_from_slice(&[1, 2, 3]);

        let model = Model::from_bytes(&bytes).unwrap();
        assert_eq!(model.header(), &ModelHeader::cifar10());
        assert_eq!(model.weights(), &[1, 2, 3]);
        assert_eq!(model.header().input_bytes(), 3072);
        assert_eq!(model.header().output_bytes(), 10);
        assert!(model.check_schema().is_ok());
        assert_eq!(model.to_bytes(), bytes);
    }

    #[test]
    fn test_schema_mismatch_reported() {
        let model = Model::from_bytes(&header_bytes(2)).unwrap();
        let err = model.check_schema().unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaMismatch {
                found: 2,
                supported: 3
            }
        ));
        assert_eq!(
            err.to_string(),
            "Model provided is schema version 2 not equal to supported version 3"
        );
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = header_bytes(3);
        bytes[0] = b'X';
        assert!(matches!(
            Model::from_bytes(&bytes),
            Err(Error::BadMagic(m)) if &m == b"XPNM"
        ));
    }

    #[test]
    fn test_truncated() {
        let bytes = header_bytes(3);
        assert!(matches!(
            Model::from_bytes(&bytes[..10]),
            Err(Error::Truncated {
                needed: 18,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_unknown_element_type() {
        let mut bytes = header_bytes(3);
        bytes[8] = 7;
        assert!(matches!(
            Model::from_bytes(&bytes),
            Err(Error::UnknownElementType(7))
        ));
    }

    #[test]
    fn test_element_sizes() {
        assert_eq!(ElementType::UInt8.size(), 1);
        assert_eq!(ElementType::Float32.size(), 4);
        assert_eq!(ElementType::from_tag(1).unwrap(), ElementType::Int8);
        assert_eq!(ElementType::Float32.to_string(), "float32");
    }
}
