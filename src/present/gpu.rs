//! GPU-surface presentation
//!
//! Drives a hardware drawable that is created once at window size and then
//! resized in place. Buffer swap is the one call that may block (vsync).

use log::{debug, info};

use super::{BackendKind, PresentationBackend, Rgba};
use crate::error::Result;
use crate::shell::Geometry;

/// A hardware-backed drawable with a bound rendering context
pub trait Drawable {
    /// Resize the existing drawable; never recreates it
    fn resize(&mut self, geometry: Geometry) -> Result<()>;

    /// Clear the back buffer
    fn clear(&mut self, color: Rgba);

    /// Swap buffers, presenting the back buffer
    fn swap(&mut self) -> Result<()>;
}

pub struct GpuBackend<D: Drawable> {
    drawable: D,
    geometry: Geometry,
    clear_color: Rgba,
    frames: u64,
}

impl<D: Drawable> GpuBackend<D> {
    pub fn new(drawable: D, geometry: Geometry) -> Self {
        info!("🖥️ GPU backend ready at {}", geometry);
        Self {
            drawable,
            geometry,
            clear_color: Rgba::opaque(0, 0, 0),
            frames: 0,
        }
    }

    pub fn drawable(&self) -> &D {
        &self.drawable
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<D: Drawable> PresentationBackend for GpuBackend<D> {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn on_resize(&mut self, geometry: Geometry) -> Result<()> {
        if geometry == self.geometry {
            debug!("Drawable already at {}", geometry);
        }
        self.drawable.resize(geometry)?;
        self.geometry = geometry;
        Ok(())
    }

    // Origin is fixed when the drawable is created; the compositor places it
    fn present(&mut self, _origin: (i32, i32)) -> Result<()> {
        self.drawable.clear(self.clear_color);
        self.drawable.swap()?;
        self.frames += 1;
        Ok(())
    }

    fn set_clear_color(&mut self, color: Rgba) {
        self.clear_color = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeDrawable {
        created: u32,
        resizes: Vec<Geometry>,
        clears: Vec<Rgba>,
        swaps: u32,
    }

    impl FakeDrawable {
        fn new() -> Self {
            Self {
                created: 1,
                ..Default::default()
            }
        }
    }

    impl Drawable for FakeDrawable {
        fn resize(&mut self, geometry: Geometry) -> Result<()> {
            self.resizes.push(geometry);
            Ok(())
        }

        fn clear(&mut self, color: Rgba) {
            self.clears.push(color);
        }

        fn swap(&mut self) -> Result<()> {
            self.swaps += 1;
            Ok(())
        }
    }

    #[test]
    fn test_resize_is_in_place() {
        let mut gpu = GpuBackend::new(FakeDrawable::new(), Geometry::new(320, 200));
        gpu.on_resize(Geometry::new(640, 480)).unwrap();
        gpu.on_resize(Geometry::new(800, 600)).unwrap();
        assert_eq!(gpu.drawable().created, 1);
        assert_eq!(
            gpu.drawable().resizes,
            vec![Geometry::new(640, 480), Geometry::new(800, 600)]
        );
        assert_eq!(gpu.geometry(), Geometry::new(800, 600));
    }

    #[test]
    fn test_present_clears_then_swaps() {
        let mut gpu = GpuBackend::new(FakeDrawable::new(), Geometry::new(320, 200));
        gpu.set_clear_color(Rgba::opaque(10, 20, 30));
        gpu.present((0, 0)).unwrap();
        gpu.present((0, 0)).unwrap();
        assert_eq!(gpu.drawable().swaps, 2);
        assert_eq!(gpu.drawable().clears, vec![Rgba::opaque(10, 20, 30); 2]);
        assert_eq!(gpu.frames(), 2);
    }

    #[test]
    fn test_gpu_backend_has_no_software_framebuffer() {
        let mut gpu = GpuBackend::new(FakeDrawable::new(), Geometry::new(1, 1));
        assert!(gpu.framebuffer().is_none());
        assert_eq!(gpu.kind(), BackendKind::Gpu);
    }
}
