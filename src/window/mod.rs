//! Window: one surface with a shell role and a presentation backend
//!
//! Construction runs the whole negotiation: surface creation, shell binding,
//! the optional decoration request, the opaque region, the initial commit
//! and a round-trip, then backend creation. Afterwards the caller drives the
//! window with [`Window::poll`] followed by painting and [`Window::present`].
//!
//! Protocol objects are released in field order when the window drops:
//! backend buffers, decoration, shell role, and the surface last.

use log::{debug, info};
use wayland_client::protocol::wl_surface::WlSurface;

use crate::config::ShimConfig;
use crate::decoration::{self, DecorationMode, ToplevelDecoration};
use crate::error::{Result, ShimError};
use crate::present::{self, BackendKind, Framebuffer, PresentationBackend, Rgba};
use crate::session::registry::Capability;
use crate::session::Session;
use crate::shell::{
    self, Geometry, Identity, ShellKind, ShellSurface, ToplevelPhase, ToplevelState, WindowShared,
};

/// Owns the wl_surface and destroys it last
#[derive(Debug)]
struct SurfaceHandle(WlSurface);

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

pub struct Window {
    backend: Box<dyn PresentationBackend>,
    decoration: Option<ToplevelDecoration>,
    shell: ShellSurface,
    surface: SurfaceHandle,
    shared: WindowShared,
    origin: (i32, i32),
}

impl Window {
    /// Create and negotiate a window. Globals must already be discovered.
    pub fn new(session: &mut Session, config: &ShimConfig) -> Result<Self> {
        let qh = session.queue_handle().clone();
        let caps = session.capabilities()?;

        // Fail before creating anything when no shell can take the surface
        shell::select_shell(caps)?;

        let compositor = caps
            .compositor()
            .ok_or(ShimError::MissingCapability {
                capability: Capability::Compositor,
            })?
            .clone();
        let initial = config.window.geometry();

        let surface = SurfaceHandle(compositor.create_surface(&qh, ()));
        let shared = shell::new_shared(initial);
        let shell = ShellSurface::bind(
            caps,
            &surface.0,
            &qh,
            Identity {
                title: &config.window.title,
                app_id: &config.window.app_id,
            },
            &shared,
        )?;

        let manager = caps.decoration_manager();
        let toplevel = shell.xdg_toplevel();
        let decoration = if decoration::should_request(
            manager.is_some(),
            toplevel.is_some(),
            config.decoration.prefer_server_side,
        ) {
            manager
                .zip(toplevel)
                .map(|(manager, toplevel)| {
                    ToplevelDecoration::request_server_side(manager, toplevel, &qh)
                })
        } else {
            if manager.is_some() && toplevel.is_none() {
                debug!("Decoration manager present but the legacy shell has nothing to decorate");
            }
            None
        };

        let region = compositor.create_region(&qh, ());
        region.add(0, 0, initial.width, initial.height);
        surface.0.set_opaque_region(Some(&region));
        region.destroy();

        surface.0.commit();
        session.roundtrip()?;

        let geometry = shared.lock().geometry();
        let backend = create_backend(session, config, &surface.0, geometry)?;
        info!(
            "✅ Window \"{}\" ready: {} shell, {} backend, {}",
            config.window.title,
            shell.kind(),
            backend.kind(),
            geometry
        );

        Ok(Self {
            backend,
            decoration,
            shell,
            surface,
            shared,
            origin: config.window.origin(),
        })
    }

    /// Dispatch pending compositor events, then hand any committed resize to
    /// the backend. Once the window is closed no further requests are issued,
    /// but pings are still answered by the dispatch itself.
    pub fn poll(&mut self, session: &mut Session) -> Result<()> {
        session.poll()?;
        if !self.is_open() {
            return Ok(());
        }
        let resize = self.shared.lock().take_resize();
        if let Some(geometry) = resize {
            info!("Current Size: {},{}", geometry.width, geometry.height);
            self.backend.on_resize(geometry)?;
        }
        Ok(())
    }

    /// Put the current frame on screen. A no-op after close.
    pub fn present(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        self.backend.present(self.origin)
    }

    /// Software pixels for the next frame (shm backend only)
    pub fn framebuffer(&mut self) -> Option<Framebuffer<'_>> {
        if !self.is_open() {
            return None;
        }
        self.backend.framebuffer()
    }

    /// Clear colour for the next frame (GPU backend only)
    pub fn set_clear_color(&mut self, color: Rgba) {
        self.backend.set_clear_color(color);
    }

    pub fn is_open(&self) -> bool {
        self.shared.lock().is_open()
    }

    pub fn geometry(&self) -> Geometry {
        self.shared.lock().geometry()
    }

    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    pub fn phase(&self) -> ToplevelPhase {
        self.shared.lock().phase()
    }

    /// Snapshot of the toplevel bookkeeping
    pub fn toplevel(&self) -> ToplevelState {
        self.shared.lock().clone()
    }

    /// The underlying surface object
    pub fn window_handle(&self) -> &WlSurface {
        &self.surface.0
    }

    pub fn shell_kind(&self) -> ShellKind {
        self.shell.kind()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Mode last acknowledged by the compositor; `None` when no decoration
    /// was requested or no answer has arrived
    pub fn decoration_mode(&self) -> Option<DecorationMode> {
        self.decoration.as_ref().and_then(ToplevelDecoration::mode)
    }
}

fn create_backend(
    session: &Session,
    config: &ShimConfig,
    surface: &WlSurface,
    geometry: Geometry,
) -> Result<Box<dyn PresentationBackend>> {
    match config.presentation.backend {
        BackendKind::Shm => {
            let caps = session.capabilities()?;
            let shm = caps
                .shm()
                .ok_or(ShimError::MissingCapability {
                    capability: Capability::Shm,
                })?
                .clone();
            let backend = present::shm::create(
                shm,
                surface.clone(),
                session.queue_handle().clone(),
                session.state().shm_formats(),
                config.presentation.channels,
                geometry,
            )?;
            Ok(Box::new(backend))
        }
        #[cfg(feature = "egl")]
        BackendKind::Gpu => {
            // SAFETY: the display pointer belongs to the connection that owns `surface`
            let backend = unsafe {
                present::egl::create(
                    session.display_ptr(),
                    surface,
                    geometry,
                    config.presentation.vsync,
                )?
            };
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "egl"))]
        BackendKind::Gpu => Err(ShimError::UnsupportedBackend("gpu")),
    }
}
