//! EGL drawable over wayland-egl
//!
//! `libEGL` is loaded at runtime so builds without the feature, and machines
//! without a driver, are unaffected. The GLES2 context is made current once
//! and stays current for the life of the window.

use khronos_egl as egl;
use log::{debug, info};
use std::ffi::c_void;
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::Proxy;
use wayland_egl::WlEglSurface;

use super::gpu::{Drawable, GpuBackend};
use super::Rgba;
use crate::error::{Result, ShimError};
use crate::shell::Geometry;

type EglInstance = egl::DynamicInstance<egl::EGL1_4>;

const CONFIG_ATTRIBUTES: [egl::Int; 13] = [
    egl::SURFACE_TYPE,
    egl::WINDOW_BIT,
    egl::RED_SIZE,
    8,
    egl::GREEN_SIZE,
    8,
    egl::BLUE_SIZE,
    8,
    egl::ALPHA_SIZE,
    8,
    egl::RENDERABLE_TYPE,
    egl::OPENGL_ES2_BIT,
    egl::NONE,
];

const CONTEXT_ATTRIBUTES: [egl::Int; 3] = [egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE];

pub struct EglDrawable {
    instance: EglInstance,
    display: egl::Display,
    context: egl::Context,
    surface: egl::Surface,
    // Must outlive `surface`; dropped after Drop::drop has destroyed it
    window: WlEglSurface,
}

impl EglDrawable {
    /// Create the drawable for `surface` at `geometry` and make its context current.
    ///
    /// # Safety
    ///
    /// `display_ptr` must be the live `wl_display` that owns `surface`.
    pub unsafe fn new(
        display_ptr: *mut c_void,
        surface: &WlSurface,
        geometry: Geometry,
        vsync: bool,
    ) -> Result<Self> {
        let instance = EglInstance::load_required()
            .map_err(|e| ShimError::ContextCreation(format!("cannot load libEGL: {}", e)))?;

        let display = instance
            .get_display(display_ptr as egl::NativeDisplayType)
            .ok_or_else(|| ShimError::ContextCreation("eglGetDisplay failed".into()))?;
        let (major, minor) = instance
            .initialize(display)
            .map_err(|e| ShimError::ContextCreation(format!("eglInitialize: {}", e)))?;
        info!("EGL Version: {}.{}", major, minor);

        instance
            .bind_api(egl::OPENGL_ES_API)
            .map_err(|e| ShimError::ContextCreation(format!("eglBindAPI: {}", e)))?;
        let config = instance
            .choose_first_config(display, &CONFIG_ATTRIBUTES)
            .map_err(|e| ShimError::ContextCreation(format!("eglChooseConfig: {}", e)))?
            .ok_or_else(|| ShimError::ContextCreation("no RGBA8888 GLES2 config".into()))?;
        let context = instance
            .create_context(display, config, None, &CONTEXT_ATTRIBUTES)
            .map_err(|e| ShimError::ContextCreation(format!("eglCreateContext: {}", e)))?;

        let window = WlEglSurface::new(surface.id(), geometry.width, geometry.height)
            .map_err(|e| ShimError::SurfaceCreation(format!("wl_egl_window_create: {:?}", e)))?;
        let egl_surface = instance
            .create_window_surface(
                display,
                config,
                window.ptr() as egl::NativeWindowType,
                None,
            )
            .map_err(|e| ShimError::SurfaceCreation(format!("eglCreateWindowSurface: {}", e)))?;

        instance
            .make_current(display, Some(egl_surface), Some(egl_surface), Some(context))
            .map_err(|e| ShimError::ContextCreation(format!("eglMakeCurrent: {}", e)))?;
        if let Err(e) = instance.swap_interval(display, if vsync { 1 } else { 0 }) {
            debug!("eglSwapInterval not honoured: {}", e);
        }

        gl::load_with(|name| {
            instance
                .get_proc_address(name)
                .map_or(std::ptr::null(), |f| f as *const c_void)
        });
        gl::Viewport(0, 0, geometry.width, geometry.height);

        Ok(Self {
            instance,
            display,
            context,
            surface: egl_surface,
            window,
        })
    }
}

impl Drawable for EglDrawable {
    fn resize(&mut self, geometry: Geometry) -> Result<()> {
        self.window.resize(geometry.width, geometry.height, 0, 0);
        // SAFETY: the context created in `new` is current on this thread
        unsafe { gl::Viewport(0, 0, geometry.width, geometry.height) };
        Ok(())
    }

    fn clear(&mut self, color: Rgba) {
        // SAFETY: as above
        unsafe {
            gl::ClearColor(
                f32::from(color.r) / 255.0,
                f32::from(color.g) / 255.0,
                f32::from(color.b) / 255.0,
                f32::from(color.a) / 255.0,
            );
            gl::Clear(gl::COLOR_BUFFER_BIT);
        }
    }

    fn swap(&mut self) -> Result<()> {
        self.instance
            .swap_buffers(self.display, self.surface)
            .map_err(|e| ShimError::SurfaceCreation(format!("eglSwapBuffers: {}", e)))
    }
}

impl Drop for EglDrawable {
    fn drop(&mut self) {
        let _ = self.instance.make_current(self.display, None, None, None);
        let _ = self.instance.destroy_surface(self.display, self.surface);
        let _ = self.instance.destroy_context(self.display, self.context);
        let _ = self.instance.terminate(self.display);
    }
}

/// GPU backend for a live window
///
/// # Safety
///
/// See [`EglDrawable::new`].
pub unsafe fn create(
    display_ptr: *mut c_void,
    surface: &WlSurface,
    geometry: Geometry,
    vsync: bool,
) -> Result<GpuBackend<EglDrawable>> {
    let drawable = EglDrawable::new(display_ptr, surface, geometry, vsync)?;
    Ok(GpuBackend::new(drawable, geometry))
}
