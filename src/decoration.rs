//! Decoration negotiation for the modern shell
//!
//! When the compositor advertises `zxdg_decoration_manager_v1` and the window
//! was bound through `xdg_toplevel`, server-side decorations are requested
//! once at window creation. The compositor answers with the mode it actually
//! chose; that answer is logged and recorded, never contested. Absence of the
//! manager is not an error: the window simply has no decorations.

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use wayland_client::{Connection, Dispatch, QueueHandle, WEnum};
use wayland_protocols::xdg::decoration::zv1::client::{
    zxdg_decoration_manager_v1::ZxdgDecorationManagerV1,
    zxdg_toplevel_decoration_v1::{self, ZxdgToplevelDecorationV1},
};
use wayland_protocols::xdg::shell::client::xdg_toplevel::XdgToplevel;

use crate::session::SessionState;

/// Decoration mode chosen by the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationMode {
    /// Client-side decorations (app draws its own titlebar)
    ClientSide,
    /// Server-side decorations (compositor draws titlebar)
    ServerSide,
}

impl DecorationMode {
    fn from_wire(mode: zxdg_toplevel_decoration_v1::Mode) -> Option<Self> {
        match mode {
            zxdg_toplevel_decoration_v1::Mode::ClientSide => Some(DecorationMode::ClientSide),
            zxdg_toplevel_decoration_v1::Mode::ServerSide => Some(DecorationMode::ServerSide),
            _ => None,
        }
    }
}

impl fmt::Display for DecorationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecorationMode::ClientSide => f.write_str("client-side"),
            DecorationMode::ServerSide => f.write_str("server-side"),
        }
    }
}

/// Last mode the compositor reported for one toplevel
pub type DecorationShared = Arc<Mutex<Option<DecorationMode>>>;

/// Whether a server-side request should be issued at all
pub fn should_request(manager_present: bool, modern_toplevel: bool, prefer_server_side: bool) -> bool {
    manager_present && modern_toplevel && prefer_server_side
}

/// Per-toplevel decoration object; destroyed with the window
#[derive(Debug)]
pub struct ToplevelDecoration {
    decoration: ZxdgToplevelDecorationV1,
    mode: DecorationShared,
}

impl ToplevelDecoration {
    /// Create the decoration object for `toplevel` and ask for server-side mode
    pub fn request_server_side(
        manager: &ZxdgDecorationManagerV1,
        toplevel: &XdgToplevel,
        qh: &QueueHandle<SessionState>,
    ) -> Self {
        let mode: DecorationShared = Arc::new(Mutex::new(None));
        let decoration = manager.get_toplevel_decoration(toplevel, qh, mode.clone());
        decoration.set_mode(zxdg_toplevel_decoration_v1::Mode::ServerSide);
        info!("🎨 Requested server-side decorations");
        Self { decoration, mode }
    }

    /// Mode last reported by the compositor, if any configure arrived yet
    pub fn mode(&self) -> Option<DecorationMode> {
        *self.mode.lock()
    }
}

impl Drop for ToplevelDecoration {
    fn drop(&mut self) {
        self.decoration.destroy();
    }
}

/// Record a mode announcement. Unknown values are logged and leave the record untouched.
pub fn record_mode(
    shared: &DecorationShared,
    mode: WEnum<zxdg_toplevel_decoration_v1::Mode>,
) -> Option<DecorationMode> {
    let decoded = match mode {
        WEnum::Value(value) => DecorationMode::from_wire(value),
        WEnum::Unknown(raw) => {
            warn!("Unknown decoration mode {}", raw);
            return None;
        }
    };
    match decoded {
        Some(mode) => {
            info!("Mode: {}", mode);
            *shared.lock() = Some(mode);
            Some(mode)
        }
        None => {
            debug!("Unrecognized decoration mode ignored");
            None
        }
    }
}

impl Dispatch<ZxdgToplevelDecorationV1, DecorationShared> for SessionState {
    fn event(
        _: &mut Self,
        _: &ZxdgToplevelDecorationV1,
        event: zxdg_toplevel_decoration_v1::Event,
        shared: &DecorationShared,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let zxdg_toplevel_decoration_v1::Event::Configure { mode } = event {
            record_mode(shared, mode);
        }
    }
}
