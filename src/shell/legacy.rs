//! Legacy shell binding: wl_shell_surface
//!
//! There is no configure/ack handshake and no state set here. A configure
//! with a positive size is applied directly.

use log::debug;
use wayland_client::protocol::{wl_shell, wl_shell_surface, wl_surface::WlSurface};
use wayland_client::{Connection, Dispatch, QueueHandle};

use super::liveness;
use super::toplevel::ConfigureOutcome;
use super::{Identity, WindowShared};
use crate::session::SessionState;

#[derive(Debug)]
pub struct LegacyShellSurface {
    // wl_shell_surface has no destructor; the role ends with the wl_surface
    _shell_surface: wl_shell_surface::WlShellSurface,
}

impl LegacyShellSurface {
    pub fn new(
        shell: &wl_shell::WlShell,
        surface: &WlSurface,
        qh: &QueueHandle<SessionState>,
        identity: Identity<'_>,
        shared: &WindowShared,
    ) -> Self {
        let shell_surface = shell.get_shell_surface(surface, qh, shared.clone());
        shell_surface.set_title(identity.title.to_owned());
        shell_surface.set_class(identity.app_id.to_owned());
        shell_surface.set_toplevel();
        Self {
            _shell_surface: shell_surface,
        }
    }
}

impl Dispatch<wl_shell_surface::WlShellSurface, WindowShared> for SessionState {
    fn event(
        _: &mut Self,
        shell_surface: &wl_shell_surface::WlShellSurface,
        event: wl_shell_surface::Event,
        shared: &WindowShared,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_shell_surface::Event::Ping { serial } => {
                liveness::answer_ping(shell_surface, serial)
            }
            wl_shell_surface::Event::Configure { width, height, .. } => {
                if let ConfigureOutcome::Resized(geometry) =
                    shared.lock().handle_legacy_configure(width, height)
                {
                    debug!("Legacy configure applied: {}", geometry);
                }
            }
            wl_shell_surface::Event::PopupDone => {}
            _ => {}
        }
    }
}
