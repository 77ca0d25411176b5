//! Modern shell binding: xdg_surface + xdg_toplevel

use log::{debug, info};
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Connection, Dispatch, QueueHandle};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use super::toplevel::{ConfigureOutcome, GeometryUpdate, StateFlags};
use super::{Identity, WindowShared};
use crate::session::SessionState;

#[derive(Debug)]
pub struct XdgShellSurface {
    xdg_surface: xdg_surface::XdgSurface,
    toplevel: xdg_toplevel::XdgToplevel,
}

impl XdgShellSurface {
    pub fn new(
        wm_base: &xdg_wm_base::XdgWmBase,
        surface: &WlSurface,
        qh: &QueueHandle<SessionState>,
        identity: Identity<'_>,
        shared: &WindowShared,
    ) -> Self {
        let xdg_surface = wm_base.get_xdg_surface(surface, qh, shared.clone());
        let toplevel = xdg_surface.get_toplevel(qh, shared.clone());
        toplevel.set_title(identity.title.to_owned());
        toplevel.set_app_id(identity.app_id.to_owned());
        Self {
            xdg_surface,
            toplevel,
        }
    }

    pub fn toplevel(&self) -> &xdg_toplevel::XdgToplevel {
        &self.toplevel
    }
}

impl Drop for XdgShellSurface {
    fn drop(&mut self) {
        // Role object goes first, then the xdg_surface it was created from
        self.toplevel.destroy();
        self.xdg_surface.destroy();
    }
}

impl Dispatch<xdg_surface::XdgSurface, WindowShared> for SessionState {
    fn event(
        _: &mut Self,
        xdg_surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        shared: &WindowShared,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            match shared.lock().commit_configure(serial, xdg_surface) {
                ConfigureOutcome::Resized(geometry) => {
                    debug!("Configure {} applied: {}", serial, geometry)
                }
                ConfigureOutcome::Unchanged => debug!("Configure {} acknowledged", serial),
                ConfigureOutcome::Dropped => debug!("Configure {} after close dropped", serial),
            }
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, WindowShared> for SessionState {
    fn event(
        _: &mut Self,
        _: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        shared: &WindowShared,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure {
                width,
                height,
                states,
            } => {
                let states = StateFlags::from_wire(&states);
                shared
                    .lock()
                    .stage(GeometryUpdate::new(width, height, states));
            }
            xdg_toplevel::Event::Close => shared.lock().handle_close(),
            xdg_toplevel::Event::ConfigureBounds { width, height } => {
                debug!("Configure bounds: {}x{}", width, height)
            }
            xdg_toplevel::Event::WmCapabilities { capabilities } => {
                info!("WM capabilities: {} byte(s)", capabilities.len())
            }
            _ => {}
        }
    }
}
