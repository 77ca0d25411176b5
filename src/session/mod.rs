//! Connection session
//!
//! Owns the one transport connection to the compositor, its event queue and
//! the dispatch state every protocol listener runs against. The session runs
//! the discovery round-trip that fills the [`CapabilitySet`], exposes typed
//! handles for the globals it bound, and provides the two blocking points of
//! the client (round-trip barrier) plus the non-blocking per-frame poll.
//!
//! ```text
//! Session::connect ─► discover_globals ─► (Window::new) ─► poll / poll / ...
//!                          │
//!                          └─ registry.global ─► bind ─► CapabilitySet (sealed)
//! ```

pub mod registry;

use log::{debug, info, warn};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use wayland_backend::client::WaylandError;
use wayland_client::protocol::{
    wl_buffer, wl_compositor, wl_region, wl_registry, wl_seat, wl_shell, wl_shm, wl_shm_pool,
    wl_surface,
};
use wayland_client::{Connection, Dispatch, EventQueue, QueueHandle, WEnum};
use wayland_protocols::xdg::decoration::zv1::client::zxdg_decoration_manager_v1;
use wayland_protocols::xdg::shell::client::xdg_wm_base;

use crate::error::{Result, ShimError};
use crate::shell::liveness;
use registry::{Capability, CapabilitySet, GlobalInfo};

static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Process-wide claim on the single session slot, released on drop
#[derive(Debug)]
pub(crate) struct SessionClaim(());

impl SessionClaim {
    pub(crate) fn acquire() -> Result<Self> {
        SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| SessionClaim(()))
            .map_err(|_| ShimError::SessionExists)
    }
}

impl Drop for SessionClaim {
    fn drop(&mut self) {
        SESSION_ACTIVE.store(false, Ordering::Release);
    }
}

/// A global bound during discovery
#[derive(Debug, Clone)]
pub enum BoundGlobal {
    Compositor(wl_compositor::WlCompositor),
    Seat(wl_seat::WlSeat),
    Shm(wl_shm::WlShm),
    XdgWmBase(xdg_wm_base::XdgWmBase),
    WlShell(wl_shell::WlShell),
    DecorationManager(zxdg_decoration_manager_v1::ZxdgDecorationManagerV1),
}

macro_rules! typed_handle {
    ($fn_name:ident, $cap:ident, $ty:ty) => {
        pub fn $fn_name(&self) -> Option<&$ty> {
            match self.get(Capability::$cap) {
                Some(BoundGlobal::$cap(handle)) => Some(handle),
                _ => None,
            }
        }
    };
}

impl CapabilitySet<BoundGlobal> {
    typed_handle!(compositor, Compositor, wl_compositor::WlCompositor);
    typed_handle!(seat, Seat, wl_seat::WlSeat);
    typed_handle!(shm, Shm, wl_shm::WlShm);
    typed_handle!(xdg_wm_base, XdgWmBase, xdg_wm_base::XdgWmBase);
    typed_handle!(wl_shell, WlShell, wl_shell::WlShell);
    typed_handle!(
        decoration_manager,
        DecorationManager,
        zxdg_decoration_manager_v1::ZxdgDecorationManagerV1
    );
}

/// Seat name and capabilities as announced by the compositor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeatInfo {
    pub name: Option<String>,
    pub pointer: bool,
    pub keyboard: bool,
    pub touch: bool,
}

/// State every session-level listener dispatches into
#[derive(Debug, Default)]
pub struct SessionState {
    capabilities: CapabilitySet<BoundGlobal>,
    shm_formats: Vec<wl_shm::Format>,
    seat: SeatInfo,
}

impl SessionState {
    pub fn capabilities(&self) -> &CapabilitySet<BoundGlobal> {
        &self.capabilities
    }

    /// Pixel formats the shm allocator announced, in announcement order
    pub fn shm_formats(&self) -> &[wl_shm::Format] {
        &self.shm_formats
    }

    pub fn seat(&self) -> &SeatInfo {
        &self.seat
    }

    fn bind(
        &mut self,
        registry: &wl_registry::WlRegistry,
        qh: &QueueHandle<Self>,
        capability: Capability,
        info: GlobalInfo,
    ) {
        let version = capability.bind_version(info.version);
        let handle = match capability {
            Capability::Compositor => {
                BoundGlobal::Compositor(registry.bind(info.name, version, qh, ()))
            }
            Capability::Seat => BoundGlobal::Seat(registry.bind(info.name, version, qh, ())),
            Capability::Shm => BoundGlobal::Shm(registry.bind(info.name, version, qh, ())),
            Capability::XdgWmBase => {
                BoundGlobal::XdgWmBase(registry.bind(info.name, version, qh, ()))
            }
            Capability::WlShell => BoundGlobal::WlShell(registry.bind(info.name, version, qh, ())),
            Capability::DecorationManager => {
                BoundGlobal::DecorationManager(registry.bind(info.name, version, qh, ()))
            }
        };
        debug!("Bound {} at version {}", capability, version);
        self.capabilities.insert(capability, info, handle);
    }
}

/// The process-wide connection to the compositor
pub struct Session {
    connection: Connection,
    event_queue: EventQueue<SessionState>,
    qh: QueueHandle<SessionState>,
    state: SessionState,
    registry: Option<wl_registry::WlRegistry>,
    _claim: SessionClaim,
}

impl Session {
    /// Connect to the compositor named by WAYLAND_DISPLAY / WAYLAND_SOCKET
    pub fn connect() -> Result<Self> {
        let claim = SessionClaim::acquire()?;
        let connection = Connection::connect_to_env()?;
        let event_queue = connection.new_event_queue();
        let qh = event_queue.handle();
        info!("🔌 Connected to Wayland compositor");

        Ok(Self {
            connection,
            event_queue,
            qh,
            state: SessionState::default(),
            registry: None,
            _claim: claim,
        })
    }

    /// Enumerate and bind globals, blocking until the compositor has sent all of them.
    ///
    /// Fails with [`ShimError::MissingCapability`] when a required global is absent.
    pub fn discover_globals(&mut self) -> Result<()> {
        if self.registry.is_some() {
            return Err(ShimError::AlreadyDiscovered);
        }

        let display = self.connection.display();
        self.registry = Some(display.get_registry(&self.qh, ()));

        // First barrier: every global has been announced and bound
        self.event_queue.roundtrip(&mut self.state)?;
        self.state.capabilities.seal();
        self.state.capabilities.ensure_required()?;

        // Second barrier: initial events of the freshly bound globals (shm formats, seat caps)
        self.event_queue.roundtrip(&mut self.state)?;

        info!(
            "✅ Discovery complete: modern shell {}, legacy shell {}, decorations {}",
            presence(self.state.capabilities.contains(Capability::XdgWmBase)),
            presence(self.state.capabilities.contains(Capability::WlShell)),
            presence(self.state.capabilities.contains(Capability::DecorationManager)),
        );
        Ok(())
    }

    pub fn is_discovered(&self) -> bool {
        self.state.capabilities.is_sealed()
    }

    /// Block until the compositor has processed every request sent so far
    pub fn roundtrip(&mut self) -> Result<usize> {
        Ok(self.event_queue.roundtrip(&mut self.state)?)
    }

    /// Flush outgoing requests, read whatever is on the socket without blocking
    /// and run the listeners for every queued event. Returns the number of
    /// events dispatched.
    pub fn poll(&mut self) -> Result<usize> {
        self.flush()?;
        if let Some(guard) = self.event_queue.prepare_read() {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(err)) if err.kind() == ErrorKind::WouldBlock => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(self.event_queue.dispatch_pending(&mut self.state)?)
    }

    pub fn flush(&self) -> Result<()> {
        match self.connection.flush() {
            Ok(()) => Ok(()),
            Err(WaylandError::Io(err)) if err.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn capabilities(&self) -> Result<&CapabilitySet<BoundGlobal>> {
        if !self.is_discovered() {
            return Err(ShimError::NotDiscovered);
        }
        Ok(&self.state.capabilities)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn queue_handle(&self) -> &QueueHandle<SessionState> {
        &self.qh
    }

    /// Raw `wl_display` pointer for the EGL platform display
    #[cfg(feature = "egl")]
    pub fn display_ptr(&self) -> *mut std::ffi::c_void {
        self.connection.backend().display_ptr() as *mut std::ffi::c_void
    }
}

fn presence(present: bool) -> &'static str {
    if present {
        "present"
    } else {
        "absent"
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for SessionState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                info!("{}: {} {}", name, interface, version);
                let Some(capability) = Capability::from_interface(&interface) else {
                    return;
                };
                if state.capabilities.is_sealed() {
                    warn!(
                        "Ignoring {} (name {}) advertised after discovery",
                        capability, name
                    );
                    return;
                }
                if state.capabilities.contains(capability) {
                    debug!("Duplicate {} (name {}) ignored", capability, name);
                    return;
                }
                state.bind(registry, qh, capability, GlobalInfo { name, version });
            }
            wl_registry::Event::GlobalRemove { name } => {
                match state.capabilities.capability_for_name(name) {
                    Some(capability) => {
                        warn!("Compositor removed bound global {} (name {})", capability, name)
                    }
                    None => debug!("Global {} removed", name),
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for SessionState {
    fn event(
        state: &mut Self,
        _: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_seat::Event::Capabilities { capabilities } => match capabilities {
                WEnum::Value(caps) => {
                    state.seat.pointer = caps.contains(wl_seat::Capability::Pointer);
                    state.seat.keyboard = caps.contains(wl_seat::Capability::Keyboard);
                    state.seat.touch = caps.contains(wl_seat::Capability::Touch);
                    info!(
                        "Seat capabilities: pointer={} keyboard={} touch={}",
                        state.seat.pointer, state.seat.keyboard, state.seat.touch
                    );
                }
                WEnum::Unknown(bits) => warn!("Unrecognized seat capability bits {:#x}", bits),
            },
            wl_seat::Event::Name { name } => {
                info!("Seat name: {}", name);
                state.seat.name = Some(name);
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_shm::WlShm, ()> for SessionState {
    fn event(
        state: &mut Self,
        _: &wl_shm::WlShm,
        event: wl_shm::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_shm::Event::Format { format } = event {
            match format {
                WEnum::Value(format) => {
                    debug!("Format Supported: {:?}", format);
                    state.shm_formats.push(format);
                }
                WEnum::Unknown(code) => debug!("Unknown Format: {:#010x}", code),
            }
        }
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for SessionState {
    fn event(
        _: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            liveness::answer_ping(wm_base, serial);
        }
    }
}

// Globals and objects without events this client cares about
macro_rules! ignore_events {
    ($($iface:ty),* $(,)?) => {
        $(
            impl Dispatch<$iface, ()> for SessionState {
                fn event(
                    _: &mut Self,
                    _: &$iface,
                    _: <$iface as wayland_client::Proxy>::Event,
                    _: &(),
                    _: &Connection,
                    _: &QueueHandle<Self>,
                ) {
                }
            }
        )*
    };
}

ignore_events!(
    wl_compositor::WlCompositor,
    wl_shell::WlShell,
    wl_region::WlRegion,
    wl_shm_pool::WlShmPool,
    zxdg_decoration_manager_v1::ZxdgDecorationManagerV1,
);

impl Dispatch<wl_surface::WlSurface, ()> for SessionState {
    fn event(
        _: &mut Self,
        _: &wl_surface::WlSurface,
        event: wl_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_surface::Event::Enter { output } => debug!("Surface entered output {:?}", output),
            wl_surface::Event::Leave { output } => debug!("Surface left output {:?}", output),
            _ => {}
        }
    }
}

impl Dispatch<wl_buffer::WlBuffer, ()> for SessionState {
    fn event(
        _: &mut Self,
        buffer: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            log::trace!("Buffer {:?} released by compositor", buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_only_one_session_claim_at_a_time() {
        let first = SessionClaim::acquire().expect("slot should be free");
        assert!(matches!(
            SessionClaim::acquire(),
            Err(ShimError::SessionExists)
        ));
        drop(first);
        assert!(SessionClaim::acquire().is_ok());
    }

    #[test]
    fn test_presence_labels() {
        assert_eq!(presence(true), "present");
        assert_eq!(presence(false), "absent");
    }
}
