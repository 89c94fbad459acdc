//! ARGB8888 framebuffer for the LCD panel.

use embedded_graphics::{pixelcolor::Rgb888, prelude::*};

use crate::{Result, LCD_HEIGHT, LCD_WIDTH};

/// Fully opaque alpha channel, pre-shifted into place.
const OPAQUE: u32 = 0xFF00_0000;

/// ARGB8888 framebuffer for the 800x480 display.
#[derive(Clone)]
pub struct Framebuffer {
    /// Pixel data in ARGB8888 format, row-major.
    data: Vec<u32>,
    /// Width of the framebuffer.
    width: u32,
    /// Height of the framebuffer.
    height: u32,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    /// Creates a new framebuffer initialized to opaque black.
    pub fn new() -> Self {
        Self::with_dimensions(LCD_WIDTH, LCD_HEIGHT)
    }

    /// Creates a framebuffer with custom dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize;
        Self {
            data: vec![OPAQUE; size],
            width,
            height,
        }
    }

    /// Returns the width of the framebuffer.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the framebuffer.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns a reference to the raw pixel data.
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Clears the framebuffer to a solid color.
    pub fn clear(&mut self, color: u32) {
        self.data.fill(color);
    }

    /// Sets a pixel at the given coordinates. Out-of-range writes are dropped.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: u32) {
        if x < self.width && y < self.height {
            let idx = y as usize * self.width as usize + x as usize;
            self.data[idx] = color;
        }
    }

    /// Gets a pixel at the given coordinates.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x < self.width && y < self.height {
            let idx = y as usize * self.width as usize + x as usize;
            Some(self.data[idx])
        } else {
            None
        }
    }

    /// Extracts a rectangular region as a new pixel vector.
    ///
    /// Pixels outside the framebuffer read back as 0.
    pub fn extract_region(&self, x: u32, y: u32, width: u32, height: u32) -> Vec<u32> {
        let mut region = Vec::with_capacity(width as usize * height as usize);
        for dy in 0..height {
            for dx in 0..width {
                region.push(self.get_pixel(x + dx, y + dy).unwrap_or(0));
            }
        }
        region
    }

    /// Converts the framebuffer to RGBA8 bytes for PNG encoding.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.data.len() * 4);
        for &pixel in &self.data {
            let (r, g, b) = argb_to_rgb888(pixel);
            rgba.extend_from_slice(&[r, g, b, (pixel >> 24) as u8]);
        }
        rgba
    }

    /// Encodes the framebuffer as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let rgba = self.to_rgba8();

        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&rgba)?;
        }

        Ok(png_data)
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Framebuffer {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                let argb = argb8888(color.r(), color.g(), color.b());
                self.set_pixel(point.x as u32, point.y as u32, argb);
            }
        }
        Ok(())
    }
}

/// Packs an RGB888 triplet into an opaque ARGB8888 value.
#[inline]
pub fn argb8888(r: u8, g: u8, b: u8) -> u32 {
    OPAQUE | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Splits an ARGB8888 value into its RGB888 components.
#[inline]
pub fn argb_to_rgb888(pixel: u32) -> (u8, u8, u8) {
    ((pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8)
}

/// Parses a hex color string to opaque ARGB8888.
pub fn parse_hex_color(hex: &str) -> Option<u32> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(argb8888(r, g, b))
}
