//! Panel front end: initialization, image blits and status text lines.

use embedded_graphics::{
    mono_font::{ascii::FONT_10X20, MonoFont, MonoTextStyleBuilder},
    pixelcolor::Rgb888,
    prelude::*,
    text::{Baseline, Text},
};
use embedded_hal::delay::DelayNs;
use std::path::PathBuf;
use tracing::{debug, info};

use super::framebuffer::{argb8888, argb_to_rgb888, Framebuffer};
use crate::{Error, Orientation, Result, DISPLAY_PAUSE_MS};

/// Font used for every status line.
const FONT: MonoFont<'static> = FONT_10X20;

/// Operations the classifier demo needs from a display.
pub trait DisplayAdapter {
    /// Configures orientation, font and background, then clears the panel.
    /// Must be called exactly once before any draw operation.
    fn initialize(&mut self) -> Result<()>;

    /// Blits `height` rows of `width` RGB888 triplets at `(x, y)`, then
    /// holds the frame for the configured pause.
    fn draw_image(&mut self, width: u32, height: u32, pixels: &[u8], x: u32, y: u32)
        -> Result<()>;

    /// Writes `text` left-aligned on text line `line`.
    fn show_text(&mut self, line: u16, text: &str) -> Result<()>;
}

/// Panel appearance and timing.
#[derive(Debug, Clone)]
pub struct PanelSettings {
    pub orientation: Orientation,
    /// Background color (ARGB8888).
    pub background: u32,
    /// Text color (ARGB8888).
    pub foreground: u32,
    /// Hold time after each image blit.
    pub pause_ms: u32,
    /// Directory receiving a PNG of the panel after every blit.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            orientation: Orientation::default(),
            background: argb8888(0xFF, 0xFF, 0xFF),
            foreground: argb8888(0x00, 0x00, 0x00),
            pause_ms: DISPLAY_PAUSE_MS,
            snapshot_dir: None,
        }
    }
}

/// Framebuffer-backed LCD panel.
pub struct LcdPanel<D> {
    framebuffer: Framebuffer,
    settings: PanelSettings,
    delay: D,
    initialized: bool,
    frames_written: u32,
}

impl<D: DelayNs> LcdPanel<D> {
    /// Creates a panel sized for the configured orientation.
    pub fn new(settings: PanelSettings, delay: D) -> Self {
        let (width, height) = settings.orientation.dimensions();
        Self {
            framebuffer: Framebuffer::with_dimensions(width, height),
            settings,
            delay,
            initialized: false,
            frames_written: 0,
        }
    }

    /// Returns the current panel contents.
    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Returns the delay provider.
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Returns the top pixel row of a text line.
    pub fn line_y(line: u16) -> u32 {
        line as u32 * FONT.character_size.height
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn write_snapshot(&mut self) -> Result<()> {
        let Some(dir) = &self.settings.snapshot_dir else {
            return Ok(());
        };
        let path = dir.join(format!("frame-{:03}.png", self.frames_written));
        std::fs::write(&path, self.framebuffer.to_png()?)?;
        debug!("Wrote snapshot {}", path.display());
        self.frames_written += 1;
        Ok(())
    }
}

impl<D: DelayNs> DisplayAdapter for LcdPanel<D> {
    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::AlreadyInitialized);
        }

        if let Some(dir) = &self.settings.snapshot_dir {
            std::fs::create_dir_all(dir)?;
        }

        self.framebuffer.clear(self.settings.background);
        self.initialized = true;

        info!(
            "Panel initialized ({}, {}x{})",
            self.settings.orientation,
            self.framebuffer.width(),
            self.framebuffer.height()
        );
        Ok(())
    }

    fn draw_image(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
        x: u32,
        y: u32,
    ) -> Result<()> {
        self.ensure_initialized()?;

        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(Error::ImageSize {
                expected,
                actual: pixels.len(),
            });
        }

        for (i, rgb) in pixels.chunks_exact(3).enumerate() {
            let dx = i as u32 % width;
            let dy = i as u32 / width;
            self.framebuffer.set_pixel(
                x.saturating_add(dx),
                y.saturating_add(dy),
                argb8888(rgb[0], rgb[1], rgb[2]),
            );
        }
        debug!("Blitted {}x{} image at ({}, {})", width, height, x, y);

        self.write_snapshot()?;
        self.delay.delay_ms(self.settings.pause_ms);
        Ok(())
    }

    fn show_text(&mut self, line: u16, text: &str) -> Result<()> {
        self.ensure_initialized()?;

        let (fr, fg, fb) = argb_to_rgb888(self.settings.foreground);
        let (br, bg, bb) = argb_to_rgb888(self.settings.background);
        let style = MonoTextStyleBuilder::new()
            .font(&FONT)
            .text_color(Rgb888::new(fr, fg, fb))
            .background_color(Rgb888::new(br, bg, bb))
            .build();

        let origin = Point::new(0, Self::line_y(line) as i32);
        Text::with_baseline(text, origin, style, Baseline::Top)
            .draw(&mut self.framebuffer)
            .map_err(|never| -> Error { match never {} })?;

        debug!("Line {}: {:?}", line, text);
        Ok(())
    }
}
