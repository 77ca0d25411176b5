//! Presentation backends
//!
//! One [`PresentationBackend`] is chosen when a window is created and kept for
//! the window's whole life. The shared-memory variant reallocates its pixel
//! buffer on every resize; the GPU variant resizes its drawable in place.

#[cfg(feature = "egl")]
pub mod egl;
pub mod gpu;
pub mod shm;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::shell::Geometry;

/// Which presentation backend a window uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Anonymous shared-memory framebuffer, software painted
    #[default]
    Shm,
    /// Hardware drawable with a GL context
    Gpu,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Shm => "shm",
            BackendKind::Gpu => "gpu",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte offset of each colour channel inside a 4-byte pixel.
///
/// The default is ARGB8888 as laid out in little-endian memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelLayout {
    pub red: usize,
    pub green: usize,
    pub blue: usize,
    pub alpha: usize,
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self {
            red: 2,
            green: 1,
            blue: 0,
            alpha: 3,
        }
    }
}

impl ChannelLayout {
    /// True when the four offsets are a permutation of 0..=3
    pub fn is_valid(&self) -> bool {
        let mut seen = [false; 4];
        for offset in [self.red, self.green, self.blue, self.alpha] {
            if offset > 3 || seen[offset] {
                return false;
            }
            seen[offset] = true;
        }
        true
    }

    #[inline]
    pub fn write(&self, pixel: &mut [u8], color: Rgba) {
        pixel[self.red] = color.r;
        pixel[self.green] = color.g;
        pixel[self.blue] = color.b;
        pixel[self.alpha] = color.a;
    }
}

/// 8-bit straight-alpha colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Fill every pixel of a `width × height` buffer with `stride` bytes per row
pub fn paint_pixels<F>(
    pixels: &mut [u8],
    width: usize,
    height: usize,
    stride: usize,
    layout: ChannelLayout,
    mut shade: F,
) where
    F: FnMut(usize, usize) -> Rgba,
{
    for (y, row) in pixels.chunks_exact_mut(stride).take(height).enumerate() {
        for (x, pixel) in row.chunks_exact_mut(4).take(width).enumerate() {
            layout.write(pixel, shade(x, y));
        }
    }
}

/// Writable view of a software framebuffer
pub struct Framebuffer<'a> {
    pixels: &'a mut [u8],
    geometry: Geometry,
    layout: ChannelLayout,
}

impl<'a> Framebuffer<'a> {
    pub fn new(pixels: &'a mut [u8], geometry: Geometry, layout: ChannelLayout) -> Self {
        Self {
            pixels,
            geometry,
            layout,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn pixels(&self) -> &[u8] {
        &*self.pixels
    }

    /// Paint every pixel with `shade(x, y)`
    pub fn paint<F>(&mut self, shade: F)
    where
        F: FnMut(usize, usize) -> Rgba,
    {
        let width = self.geometry.width.max(0) as usize;
        let height = self.geometry.height.max(0) as usize;
        paint_pixels(self.pixels, width, height, width * 4, self.layout, shade);
    }

    pub fn fill(&mut self, color: Rgba) {
        self.paint(|_, _| color);
    }
}

/// The per-window presentation interface
pub trait PresentationBackend {
    fn kind(&self) -> BackendKind;

    /// React to a consumed resize; the toplevel flag is already cleared
    fn on_resize(&mut self, geometry: Geometry) -> Result<()>;

    /// Put the current frame on screen at `origin`
    fn present(&mut self, origin: (i32, i32)) -> Result<()>;

    /// Software pixels of the current frame, if this backend has any
    fn framebuffer(&mut self) -> Option<Framebuffer<'_>> {
        None
    }

    /// Colour to clear a hardware frame with, if this backend supports it
    fn set_clear_color(&mut self, _color: Rgba) {}
}
