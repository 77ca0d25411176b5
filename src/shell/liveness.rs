//! Ping/pong liveness sub-protocol
//!
//! Independent of the geometry state machine: every ping is answered within
//! the dispatch turn it arrives in, with the same serial, whatever state the
//! window is in (including after close). A missed pong is only observable on
//! the compositor side.

use log::trace;
use wayland_client::protocol::wl_shell_surface;
use wayland_protocols::xdg::shell::client::xdg_wm_base;

/// An object that can answer a compositor ping
#[cfg_attr(test, mockall::automock)]
pub trait PongSink {
    fn pong(&self, serial: u32);
}

impl PongSink for xdg_wm_base::XdgWmBase {
    fn pong(&self, serial: u32) {
        xdg_wm_base::XdgWmBase::pong(self, serial);
    }
}

impl PongSink for wl_shell_surface::WlShellSurface {
    fn pong(&self, serial: u32) {
        wl_shell_surface::WlShellSurface::pong(self, serial);
    }
}

/// Answer a ping unconditionally
pub fn answer_ping<P: PongSink + ?Sized>(sink: &P, serial: u32) {
    trace!("ping {} -> pong", serial);
    sink.pong(serial);
}
