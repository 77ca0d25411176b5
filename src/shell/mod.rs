//! Shell negotiation
//!
//! Picks the window-management protocol once per window and hides the two
//! variants behind [`ShellSurface`]. The modern shell (`xdg_wm_base`) is
//! always preferred; the legacy `wl_shell` is only used when the modern one
//! was not advertised.

pub mod legacy;
pub mod liveness;
pub mod toplevel;
pub mod xdg;

use log::info;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::QueueHandle;
use wayland_protocols::xdg::shell::client::xdg_toplevel::XdgToplevel;

use crate::error::{Result, ShimError};
use crate::session::registry::{Capability, CapabilitySet};
use crate::session::{BoundGlobal, SessionState};

pub use toplevel::{
    ConfigureAck, ConfigureOutcome, Geometry, GeometryUpdate, StateFlag, StateFlags,
    ToplevelPhase, ToplevelState,
};

/// Toplevel state shared between the window and its shell listeners
pub type WindowShared = Arc<Mutex<ToplevelState>>;

pub fn new_shared(initial: Geometry) -> WindowShared {
    Arc::new(Mutex::new(ToplevelState::new(initial)))
}

/// Which shell protocol a window was bound through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    /// xdg_wm_base / xdg_surface / xdg_toplevel
    Xdg,
    /// wl_shell / wl_shell_surface
    Legacy,
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellKind::Xdg => f.write_str("xdg_wm_base"),
            ShellKind::Legacy => f.write_str("wl_shell"),
        }
    }
}

/// Modern if advertised, else legacy, else [`ShimError::NoShellAvailable`]
pub fn select_shell<H>(capabilities: &CapabilitySet<H>) -> Result<ShellKind> {
    if capabilities.contains(Capability::XdgWmBase) {
        Ok(ShellKind::Xdg)
    } else if capabilities.contains(Capability::WlShell) {
        Ok(ShellKind::Legacy)
    } else {
        Err(ShimError::NoShellAvailable)
    }
}

/// Title and application id pushed to the shell at bind time
#[derive(Debug, Clone, Copy)]
pub struct Identity<'a> {
    pub title: &'a str,
    pub app_id: &'a str,
}

/// The shell role object of a window
#[derive(Debug)]
pub enum ShellSurface {
    Xdg(xdg::XdgShellSurface),
    Legacy(legacy::LegacyShellSurface),
}

impl ShellSurface {
    /// Give `surface` the toplevel role through the best available shell.
    ///
    /// Does not commit; the caller commits once decorations are requested.
    pub fn bind(
        capabilities: &CapabilitySet<BoundGlobal>,
        surface: &WlSurface,
        qh: &QueueHandle<SessionState>,
        identity: Identity<'_>,
        shared: &WindowShared,
    ) -> Result<Self> {
        let kind = select_shell(capabilities)?;
        let shell = match kind {
            ShellKind::Xdg => {
                let wm_base = capabilities
                    .xdg_wm_base()
                    .ok_or(ShimError::NoShellAvailable)?;
                ShellSurface::Xdg(xdg::XdgShellSurface::new(
                    wm_base, surface, qh, identity, shared,
                ))
            }
            ShellKind::Legacy => {
                let shell = capabilities.wl_shell().ok_or(ShimError::NoShellAvailable)?;
                ShellSurface::Legacy(legacy::LegacyShellSurface::new(
                    shell, surface, qh, identity, shared,
                ))
            }
        };
        info!("🪟 Toplevel bound through {}", kind);
        Ok(shell)
    }

    pub fn kind(&self) -> ShellKind {
        match self {
            ShellSurface::Xdg(_) => ShellKind::Xdg,
            ShellSurface::Legacy(_) => ShellKind::Legacy,
        }
    }

    /// The modern toplevel, needed for decoration negotiation
    pub fn xdg_toplevel(&self) -> Option<&XdgToplevel> {
        match self {
            ShellSurface::Xdg(xdg) => Some(xdg.toplevel()),
            ShellSurface::Legacy(_) => None,
        }
    }
}
