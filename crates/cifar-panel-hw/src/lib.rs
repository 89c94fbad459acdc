//! CIFAR Panel Hardware Library
//!
//! Display adapter for the classifier demo: an ARGB8888 framebuffer panel
//! with fixed text lines, blocking image blits and optional PNG snapshots.

pub mod error;
pub mod lcd;
pub mod orientation;

pub use error::{Error, Result};
pub use lcd::{DisplayAdapter, Framebuffer, LcdPanel, PanelSettings, StdDelay};
pub use orientation::Orientation;

/// LCD display dimensions in landscape orientation.
pub const LCD_WIDTH: u32 = 800;
pub const LCD_HEIGHT: u32 = 480;

/// Time an image stays on screen before the next one may overwrite it.
pub const DISPLAY_PAUSE_MS: u32 = 5000;
