//! LCD display module.
//!
//! Provides the 800x480 ARGB8888 panel used to show classification results.

mod delay;
mod panel;

pub mod framebuffer;

pub use delay::StdDelay;
pub use framebuffer::{argb8888, argb_to_rgb888, parse_hex_color, Framebuffer};
pub use panel::{DisplayAdapter, LcdPanel, PanelSettings};
