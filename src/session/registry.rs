//! Capability registry
//!
//! Records which globals the compositor advertised during the discovery
//! round-trip, keyed by a closed set of [`Capability`] names. Interfaces are
//! matched by exact name; anything unrecognised is ignored so newer
//! compositors keep working. Once discovery completes the set is sealed and
//! later announcements no longer change it.

use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, ShimError};

/// Globals this client knows how to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// wl_compositor, the surface/region broker
    Compositor,
    /// wl_seat
    Seat,
    /// wl_shm, the shared-memory allocator
    Shm,
    /// xdg_wm_base, the modern shell
    XdgWmBase,
    /// wl_shell, the legacy shell
    WlShell,
    /// zxdg_decoration_manager_v1
    DecorationManager,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Compositor,
        Capability::Seat,
        Capability::Shm,
        Capability::XdgWmBase,
        Capability::WlShell,
        Capability::DecorationManager,
    ];

    /// Globals whose absence after discovery is fatal
    pub const REQUIRED: [Capability; 3] =
        [Capability::Compositor, Capability::Seat, Capability::Shm];

    /// Protocol interface name advertised by the compositor
    pub fn interface(self) -> &'static str {
        match self {
            Capability::Compositor => "wl_compositor",
            Capability::Seat => "wl_seat",
            Capability::Shm => "wl_shm",
            Capability::XdgWmBase => "xdg_wm_base",
            Capability::WlShell => "wl_shell",
            Capability::DecorationManager => "zxdg_decoration_manager_v1",
        }
    }

    /// Exact-name lookup; `None` for interfaces this client does not use
    pub fn from_interface(interface: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cap| cap.interface() == interface)
    }

    /// Highest interface version this client implements
    pub fn max_version(self) -> u32 {
        match self {
            // v4 keeps attach(x, y) legal; v5 turned non-zero offsets into a protocol error
            Capability::Compositor => 4,
            Capability::Seat => 7,
            Capability::Shm => 1,
            // v5 adds wm_capabilities; suspended (v6) is not needed
            Capability::XdgWmBase => 5,
            Capability::WlShell => 1,
            Capability::DecorationManager => 1,
        }
    }

    /// Version to bind at: never above what either side supports
    pub fn bind_version(self, advertised: u32) -> u32 {
        advertised.min(self.max_version())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interface())
    }
}

/// Registry name and version of an advertised global
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalInfo {
    pub name: u32,
    pub version: u32,
}

#[derive(Debug, Clone)]
struct Entry<H> {
    info: GlobalInfo,
    handle: H,
}

/// Mapping from capability to the handle bound for it.
///
/// `H` is the bound protocol object in a live session and `()` in tests that
/// only care about presence.
#[derive(Debug, Clone)]
pub struct CapabilitySet<H> {
    entries: BTreeMap<Capability, Entry<H>>,
    sealed: bool,
}

impl<H> Default for CapabilitySet<H> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            sealed: false,
        }
    }
}

impl<H> CapabilitySet<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a bound global. Returns false when the set is already sealed or
    /// the capability was bound before (first announcement wins).
    pub fn insert(&mut self, capability: Capability, info: GlobalInfo, handle: H) -> bool {
        if self.sealed {
            warn!(
                "Ignoring late global {} (name {}) advertised after discovery",
                capability, info.name
            );
            return false;
        }
        if self.entries.contains_key(&capability) {
            debug!("Duplicate global {} (name {}) ignored", capability, info.name);
            return false;
        }
        self.entries.insert(capability, Entry { info, handle });
        true
    }

    /// Freeze the set; called once the discovery barrier returns
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn get(&self, capability: Capability) -> Option<&H> {
        self.entries.get(&capability).map(|entry| &entry.handle)
    }

    pub fn info(&self, capability: Capability) -> Option<GlobalInfo> {
        self.entries.get(&capability).map(|entry| entry.info)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.entries.contains_key(&capability)
    }

    /// Whether the registry name belongs to one of the bound globals
    pub fn capability_for_name(&self, name: u32) -> Option<Capability> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.info.name == name)
            .map(|(cap, _)| *cap)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, &H)> {
        self.entries.iter().map(|(cap, entry)| (*cap, &entry.handle))
    }

    /// Fails with the first required capability that is absent
    pub fn ensure_required(&self) -> Result<()> {
        match Capability::REQUIRED
            .into_iter()
            .find(|cap| !self.contains(*cap))
        {
            Some(capability) => Err(ShimError::MissingCapability { capability }),
            None => Ok(()),
        }
    }
}
