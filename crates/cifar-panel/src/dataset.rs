//! CIFAR-10 binary dataset loading.
//!
//! Each record is one label byte followed by the red, green and blue planes
//! of a 32x32 image (1024 bytes each).

use anyhow::{bail, Context, Result};
use cifar_panel_infer::{IMAGE_BYTES, IMAGE_CHANNELS, IMAGE_SIZE};
use std::path::Path;
use tracing::info;

/// Bytes per dataset record: label plus image.
pub const RECORD_BYTES: usize = 1 + IMAGE_BYTES;

/// Class names indexed by label.
pub const LABELS: [&str; 10] = [
    "Plane", "Car", "Bird", "Cat", "Deer", "Dog", "Frog", "Horse", "Ship", "Truck",
];

/// Returns the class name for a label, if it is in range.
pub fn label_name(label: usize) -> Option<&'static str> {
    LABELS.get(label).copied()
}

/// One labeled image, stored planar as read from disk.
#[derive(Debug, Clone)]
pub struct Sample {
    label: u8,
    planar: Box<[u8; IMAGE_BYTES]>,
}

impl Sample {
    /// Ground-truth label byte.
    pub fn label(&self) -> u8 {
        self.label
    }

    /// Pixels in row-major interleaved RGB order.
    pub fn interleaved(&self) -> Vec<u8> {
        reshape_planar(&self.planar)
    }
}

/// Converts a planar CHW image to interleaved HWC.
///
/// Planar byte `c * 1024 + y * 32 + x` lands at `(y * 32 + x) * 3 + c`.
fn reshape_planar(planar: &[u8; IMAGE_BYTES]) -> Vec<u8> {
    let plane = IMAGE_SIZE * IMAGE_SIZE;
    let mut interleaved = vec![0; IMAGE_BYTES];
    for (i, &value) in planar.iter().enumerate() {
        let channel = i / plane;
        let pixel = i % plane;
        interleaved[pixel * IMAGE_CHANNELS + channel] = value;
    }
    interleaved
}

/// Immutable set of samples.
#[derive(Debug, Clone)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    /// Parses the first `count` records of a CIFAR-10 binary batch.
    pub fn from_bytes(bytes: &[u8], count: usize) -> Result<Self> {
        if bytes.len() % RECORD_BYTES != 0 {
            bail!(
                "Dataset length {} is not a multiple of the {}-byte record size",
                bytes.len(),
                RECORD_BYTES
            );
        }

        let available = bytes.len() / RECORD_BYTES;
        if available < count {
            bail!("Dataset holds {} records, {} requested", available, count);
        }

        let samples = bytes
            .chunks_exact(RECORD_BYTES)
            .take(count)
            .map(|record| {
                Ok(Sample {
                    label: record[0],
                    planar: Box::new(record[1..].try_into()?),
                })
            })
            .collect::<Result<_>>()?;

        Ok(Self { samples })
    }

    /// Loads the first `count` records from a file.
    pub fn load<P: AsRef<Path>>(path: P, count: usize) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        let dataset = Self::from_bytes(&bytes, count)
            .with_context(|| format!("Invalid dataset {}", path.display()))?;
        info!("Loaded {} samples from {}", dataset.len(), path.display());
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a CIFAR-style record whose planes are filled with `r`, `g`, `b`.
    pub(crate) fn record(label: u8, r: u8, g: u8, b: u8) -> Vec<u8> {
        let plane = IMAGE_SIZE * IMAGE_SIZE;
        let mut out = vec![label];
        out.extend(std::iter::repeat(r).take(plane));
        out.extend(std::iter::repeat(g).take(plane));
        out.extend(std::iter::repeat(b).take(plane));
        out
    }

    #[test]
    fn test_reshape_planar() {
        let planar: Vec<u8> = (0..IMAGE_BYTES).map(|i| (i / 1024) as u8 * 10).collect();
        let interleaved = reshape_planar(planar.as_slice().try_into().unwrap());
        assert_eq!(interleaved.len(), IMAGE_BYTES);
        assert_eq!(&interleaved[..6], &[0, 10, 20, 0, 10, 20]);

        // Pixel (x=5, y=2) of the green plane.
        let mut planar = [0u8; IMAGE_BYTES];
        planar[1024 + 2 * 32 + 5] = 99;
        let interleaved = reshape_planar(&planar);
        assert_eq!(interleaved[(2 * 32 + 5) * 3 + 1], 99);
        assert_eq!(interleaved.iter().filter(|&&b| b == 99).count(), 1);
    }

    #[test]
    fn test_from_bytes() {
        let mut bytes = record(0, 1, 2, 3);
        bytes.extend(record(9, 4, 5, 6));
        bytes.extend(record(3, 7, 8, 9));

        let dataset = Dataset::from_bytes(&bytes, 2).unwrap();
        assert_eq!(dataset.len(), 2);

        let labels: Vec<u8> = dataset.iter().map(Sample::label).collect();
        assert_eq!(labels, vec![0, 9]);

        let first = dataset.iter().next().unwrap();
        assert_eq!(&first.interleaved()[..3], &[1, 2, 3]);
        assert_eq!(first.planar.len(), IMAGE_BYTES);
    }

    #[test]
    fn test_rejects_short_or_ragged() {
        let bytes = record(0, 0, 0, 0);
        assert!(Dataset::from_bytes(&bytes, 2).is_err());
        assert!(Dataset::from_bytes(&bytes[..100], 0).is_err());
    }

    #[test]
    fn test_label_names() {
        assert_eq!(label_name(0), Some("Plane"));
        assert_eq!(label_name(9), Some("Truck"));
        assert_eq!(label_name(10), None);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Dataset::load(dir.path().join("nope.bin"), 10).is_err());
    }
}
