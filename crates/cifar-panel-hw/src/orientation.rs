//! Display orientation support.
//!
//! The panel is fixed to one orientation for the lifetime of a run; it is
//! chosen before `initialize` and never changes afterwards.

use crate::{Error, Result, LCD_HEIGHT, LCD_WIDTH};
use std::str::FromStr;

/// Display orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Landscape mode (800x480), panel native.
    #[default]
    Landscape,
    /// Portrait mode (480x800).
    Portrait,
}

impl Orientation {
    /// Returns true if this is a portrait orientation.
    pub fn is_portrait(&self) -> bool {
        matches!(self, Orientation::Portrait)
    }

    /// Config name of this orientation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }

    /// Logical (width, height) of the drawable area.
    pub fn dimensions(&self) -> (u32, u32) {
        if self.is_portrait() {
            (LCD_HEIGHT, LCD_WIDTH)
        } else {
            (LCD_WIDTH, LCD_HEIGHT)
        }
    }
}

impl FromStr for Orientation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "landscape" | "l" => Ok(Orientation::Landscape),
            "portrait" | "p" => Ok(Orientation::Portrait),
            _ => Err(Error::InvalidOrientation(s.to_string())),
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_parse() {
        assert_eq!(
            "landscape".parse::<Orientation>().unwrap(),
            Orientation::Landscape
        );
        assert_eq!("P".parse::<Orientation>().unwrap(), Orientation::Portrait);
        assert!("sideways".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_orientation_dimensions() {
        assert_eq!(Orientation::Landscape.dimensions(), (800, 480));
        assert_eq!(Orientation::Portrait.dimensions(), (480, 800));
        assert_eq!(Orientation::Portrait.to_string(), "portrait");
    }
}
