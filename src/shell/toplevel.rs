//! Toplevel state machine
//!
//! Interprets configuration events from the shell and decides whether a
//! proposed geometry is an actionable resize.
//!
//! # States
//!
//! ```text
//!   Unconfigured ──configure──► Configured ──configure──┐
//!        │                          │    ▲──────────────┘
//!        └──────────close───────────┴──close──► Closed (terminal)
//! ```
//!
//! # Resize policy (modern shell)
//!
//! A proposal is applied only when both dimensions are positive **and** the
//! state set carries at least one of `resizing`, `maximized` or a `tiled-*`
//! edge. `activated` and `fullscreen` alone never resize the window. The
//! configure is acknowledged with its serial whether or not it was applied.
//!
//! The legacy shell has no state set: any positive size is applied as is.

use log::{debug, info, warn};
use std::fmt;
use wayland_protocols::xdg::shell::client::xdg_surface;

/// Logical window size in surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Bytes per row of a 4-byte-per-pixel buffer of this size
    pub fn stride(&self) -> i32 {
        self.width * 4
    }

    /// Size in bytes of a 4-byte-per-pixel buffer of this size
    pub fn byte_len(&self) -> usize {
        self.width.max(0) as usize * self.height.max(0) as usize * 4
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// xdg_toplevel state values this client recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StateFlag {
    Maximized = 1,
    Fullscreen = 2,
    Resizing = 3,
    Activated = 4,
    TiledLeft = 5,
    TiledRight = 6,
    TiledTop = 7,
    TiledBottom = 8,
    Suspended = 9,
}

impl StateFlag {
    pub const ALL: [StateFlag; 9] = [
        StateFlag::Maximized,
        StateFlag::Fullscreen,
        StateFlag::Resizing,
        StateFlag::Activated,
        StateFlag::TiledLeft,
        StateFlag::TiledRight,
        StateFlag::TiledTop,
        StateFlag::TiledBottom,
        StateFlag::Suspended,
    ];

    /// Flags that put a configure in resizing context. Fullscreen is not one of them.
    pub const RESIZE_TRIGGERS: [StateFlag; 6] = [
        StateFlag::Resizing,
        StateFlag::Maximized,
        StateFlag::TiledLeft,
        StateFlag::TiledRight,
        StateFlag::TiledTop,
        StateFlag::TiledBottom,
    ];

    pub fn from_raw(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| *flag as u32 == value)
    }

    pub fn triggers_resize(self) -> bool {
        Self::RESIZE_TRIGGERS.contains(&self)
    }

    fn bit(self) -> u16 {
        1 << (self as u32)
    }
}

/// Set of toplevel state flags carried by one configure
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StateFlags(u16);

impl StateFlags {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, flag: StateFlag) {
        self.0 |= flag.bit();
    }

    pub fn with(mut self, flag: StateFlag) -> Self {
        self.insert(flag);
        self
    }

    pub fn contains(&self, flag: StateFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = StateFlag> + '_ {
        StateFlag::ALL.into_iter().filter(|flag| self.contains(*flag))
    }

    /// True iff any of resizing, maximized or tiled-{left,right,top,bottom} is set
    pub fn is_resizing_context(&self) -> bool {
        StateFlag::RESIZE_TRIGGERS
            .iter()
            .any(|flag| self.contains(*flag))
    }

    /// Decode the wire array of native-endian u32 state values.
    ///
    /// Unknown values and a trailing partial element are logged and skipped.
    pub fn from_wire(bytes: &[u8]) -> Self {
        let mut flags = Self::empty();
        let chunks = bytes.chunks_exact(4);
        if !chunks.remainder().is_empty() {
            warn!(
                "Malformed toplevel state array: {} trailing byte(s) ignored",
                chunks.remainder().len()
            );
        }
        for chunk in chunks {
            let raw = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            match StateFlag::from_raw(raw) {
                Some(flag) => flags.insert(flag),
                None => debug!("Unknown toplevel state {} ignored", raw),
            }
        }
        flags
    }
}

impl FromIterator<StateFlag> for StateFlags {
    fn from_iter<T: IntoIterator<Item = StateFlag>>(iter: T) -> Self {
        let mut flags = Self::empty();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

impl fmt::Debug for StateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// One configuration proposal from the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryUpdate {
    pub width: i32,
    pub height: i32,
    pub states: StateFlags,
}

impl GeometryUpdate {
    pub fn new(width: i32, height: i32, states: StateFlags) -> Self {
        Self {
            width,
            height,
            states,
        }
    }

    fn has_size(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToplevelPhase {
    /// Bound, no configure handled yet
    Unconfigured,
    /// At least one configure handled
    Configured,
    /// Close requested; terminal
    Closed,
}

/// What a configure did to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// Geometry committed and the resize flag raised
    Resized(Geometry),
    /// Geometry left untouched
    Unchanged,
    /// Window is closed; the event was dropped
    Dropped,
}

/// The request that acknowledges a configure
#[cfg_attr(test, mockall::automock)]
pub trait ConfigureAck {
    fn ack_configure(&self, serial: u32);
}

impl ConfigureAck for xdg_surface::XdgSurface {
    fn ack_configure(&self, serial: u32) {
        xdg_surface::XdgSurface::ack_configure(self, serial);
    }
}

/// Geometry and lifecycle of one toplevel
#[derive(Debug, Clone)]
pub struct ToplevelState {
    phase: ToplevelPhase,
    geometry: Geometry,
    resized: bool,
    staged: Option<GeometryUpdate>,
    last_acked_serial: Option<u32>,
    configure_count: u64,
}

impl ToplevelState {
    /// A freshly bound toplevel. The resize flag starts raised so the backend
    /// sizes itself on the first poll.
    pub fn new(initial: Geometry) -> Self {
        Self {
            phase: ToplevelPhase::Unconfigured,
            geometry: initial,
            resized: true,
            staged: None,
            last_acked_serial: None,
            configure_count: 0,
        }
    }

    pub fn phase(&self) -> ToplevelPhase {
        self.phase
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn is_open(&self) -> bool {
        self.phase != ToplevelPhase::Closed
    }

    pub fn resize_pending(&self) -> bool {
        self.resized
    }

    pub fn last_acked_serial(&self) -> Option<u32> {
        self.last_acked_serial
    }

    pub fn configure_count(&self) -> u64 {
        self.configure_count
    }

    /// Consume the resize flag, returning the geometry to resize to
    pub fn take_resize(&mut self) -> Option<Geometry> {
        if !self.is_open() || !self.resized {
            return None;
        }
        self.resized = false;
        Some(self.geometry)
    }

    /// xdg_toplevel.configure: hold the proposal until the surface configure
    /// carrying its serial arrives.
    pub fn stage(&mut self, update: GeometryUpdate) {
        if !self.is_open() {
            return;
        }
        info!("Size: {},{}", update.width, update.height);
        debug!("State Changes: {:?}", update.states);
        if self.staged.replace(update).is_some() {
            debug!("Replacing staged configure that was never committed");
        }
    }

    /// xdg_surface.configure: apply the staged proposal (if any) and
    /// acknowledge the serial.
    pub fn commit_configure<A: ConfigureAck + ?Sized>(
        &mut self,
        serial: u32,
        ack: &A,
    ) -> ConfigureOutcome {
        if !self.is_open() {
            self.staged = None;
            return ConfigureOutcome::Dropped;
        }
        let outcome = match self.staged.take() {
            Some(update) => self.apply(&update),
            None => ConfigureOutcome::Unchanged,
        };
        ack.ack_configure(serial);
        self.last_acked_serial = Some(serial);
        outcome
    }

    /// Stage and commit in one step, for a configure that arrives as a unit
    pub fn handle_configure<A: ConfigureAck + ?Sized>(
        &mut self,
        update: GeometryUpdate,
        serial: u32,
        ack: &A,
    ) -> ConfigureOutcome {
        self.stage(update);
        self.commit_configure(serial, ack)
    }

    /// The resize policy for the modern shell
    pub fn apply(&mut self, update: &GeometryUpdate) -> ConfigureOutcome {
        if !self.is_open() {
            return ConfigureOutcome::Dropped;
        }
        self.mark_configured();
        if update.has_size() && update.states.is_resizing_context() {
            self.commit_geometry(Geometry::new(update.width, update.height))
        } else {
            ConfigureOutcome::Unchanged
        }
    }

    /// wl_shell_surface.configure: no state set, any positive size is applied
    pub fn handle_legacy_configure(&mut self, width: i32, height: i32) -> ConfigureOutcome {
        if !self.is_open() {
            return ConfigureOutcome::Dropped;
        }
        self.mark_configured();
        if width > 0 && height > 0 {
            self.commit_geometry(Geometry::new(width, height))
        } else {
            ConfigureOutcome::Unchanged
        }
    }

    /// xdg_toplevel.close
    pub fn handle_close(&mut self) {
        if self.phase != ToplevelPhase::Closed {
            info!("Close requested by compositor");
        }
        self.phase = ToplevelPhase::Closed;
        self.staged = None;
    }

    fn mark_configured(&mut self) {
        self.phase = ToplevelPhase::Configured;
        self.configure_count += 1;
    }

    fn commit_geometry(&mut self, geometry: Geometry) -> ConfigureOutcome {
        self.geometry = geometry;
        self.resized = true;
        ConfigureOutcome::Resized(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn flags(list: &[StateFlag]) -> StateFlags {
        list.iter().copied().collect()
    }

    fn acker(serial: u32) -> MockConfigureAck {
        let mut ack = MockConfigureAck::new();
        ack.expect_ack_configure()
            .with(eq(serial))
            .times(1)
            .return_const(());
        ack
    }

    fn configured(width: i32, height: i32) -> ToplevelState {
        let mut state = ToplevelState::new(Geometry::new(width, height));
        state.take_resize();
        state
    }

    #[test]
    fn test_new_toplevel_is_unconfigured_with_pending_resize() {
        let state = ToplevelState::new(Geometry::new(320, 200));
        assert_eq!(state.phase(), ToplevelPhase::Unconfigured);
        assert!(state.is_open());
        assert!(state.resize_pending());
    }

    #[test]
    fn test_fullscreen_alone_does_not_resize() {
        let mut state = configured(320, 200);
        let update = GeometryUpdate::new(
            800,
            600,
            flags(&[StateFlag::Activated, StateFlag::Fullscreen]),
        );
        let outcome = state.handle_configure(update, 7, &acker(7));
        assert_eq!(outcome, ConfigureOutcome::Unchanged);
        assert_eq!(state.geometry(), Geometry::new(320, 200));
        assert!(!state.resize_pending());
        assert_eq!(state.phase(), ToplevelPhase::Configured);
    }

    #[test]
    fn test_tiled_left_resizes() {
        let mut state = configured(320, 200);
        let update = GeometryUpdate::new(640, 480, flags(&[StateFlag::TiledLeft]));
        let outcome = state.handle_configure(update, 8, &acker(8));
        assert_eq!(outcome, ConfigureOutcome::Resized(Geometry::new(640, 480)));
        assert_eq!(state.geometry(), Geometry::new(640, 480));
        assert!(state.resize_pending());
    }

    #[test]
    fn test_every_trigger_flag_resizes() {
        for flag in StateFlag::RESIZE_TRIGGERS {
            let mut state = configured(100, 100);
            let outcome = state.apply(&GeometryUpdate::new(200, 150, flags(&[flag])));
            assert_eq!(
                outcome,
                ConfigureOutcome::Resized(Geometry::new(200, 150)),
                "{flag:?} should trigger a resize"
            );
        }
    }

    #[test]
    fn test_non_trigger_flags_never_resize() {
        for flag in [StateFlag::Activated, StateFlag::Fullscreen, StateFlag::Suspended] {
            let mut state = configured(100, 100);
            let outcome = state.apply(&GeometryUpdate::new(200, 150, flags(&[flag])));
            assert_eq!(outcome, ConfigureOutcome::Unchanged, "{flag:?}");
            assert_eq!(state.geometry(), Geometry::new(100, 100));
        }
    }

    #[test]
    fn test_zero_dimension_ignored_even_when_resizing() {
        let mut state = configured(320, 200);
        for (w, h) in [(0, 480), (640, 0), (0, 0)] {
            let update = GeometryUpdate::new(w, h, flags(&[StateFlag::Resizing]));
            assert_eq!(state.apply(&update), ConfigureOutcome::Unchanged);
        }
        assert_eq!(state.geometry(), Geometry::new(320, 200));
    }

    #[test]
    fn test_ack_sent_even_when_update_ignored() {
        let mut state = configured(320, 200);
        let update = GeometryUpdate::new(0, 0, StateFlags::empty());
        state.handle_configure(update, 99, &acker(99));
        assert_eq!(state.last_acked_serial(), Some(99));
    }

    #[test]
    fn test_surface_configure_without_toplevel_configure_still_acks() {
        let mut state = configured(320, 200);
        assert_eq!(
            state.commit_configure(5, &acker(5)),
            ConfigureOutcome::Unchanged
        );
        assert_eq!(state.last_acked_serial(), Some(5));
    }

    #[test]
    fn test_close_is_terminal() {
        let mut state = configured(320, 200);
        state.apply(&GeometryUpdate::new(640, 480, flags(&[StateFlag::Maximized])));
        assert!(state.resize_pending());

        state.handle_close();
        assert!(!state.is_open());
        assert_eq!(state.phase(), ToplevelPhase::Closed);

        let mut no_ack = MockConfigureAck::new();
        no_ack.expect_ack_configure().times(0);
        let queued = GeometryUpdate::new(1024, 768, flags(&[StateFlag::Resizing]));
        assert_eq!(
            state.handle_configure(queued, 10, &no_ack),
            ConfigureOutcome::Dropped
        );
        assert_eq!(state.handle_legacy_configure(50, 50), ConfigureOutcome::Dropped);
        assert_eq!(state.geometry(), Geometry::new(640, 480));
        assert_eq!(state.take_resize(), None);
        assert_eq!(state.phase(), ToplevelPhase::Closed);
    }

    #[test]
    fn test_legacy_configure_applies_any_positive_size() {
        let mut state = configured(320, 200);
        assert_eq!(
            state.handle_legacy_configure(800, 600),
            ConfigureOutcome::Resized(Geometry::new(800, 600))
        );
        assert!(state.resize_pending());
        assert_eq!(state.handle_legacy_configure(0, 600), ConfigureOutcome::Unchanged);
        assert_eq!(state.geometry(), Geometry::new(800, 600));
    }

    #[test]
    fn test_take_resize_clears_flag() {
        let mut state = ToplevelState::new(Geometry::new(10, 20));
        assert_eq!(state.take_resize(), Some(Geometry::new(10, 20)));
        assert_eq!(state.take_resize(), None);
        assert!(!state.resize_pending());
    }

    #[test]
    fn test_restaging_keeps_latest_proposal() {
        let mut state = configured(320, 200);
        state.stage(GeometryUpdate::new(400, 300, flags(&[StateFlag::Resizing])));
        state.stage(GeometryUpdate::new(500, 400, flags(&[StateFlag::Resizing])));
        state.commit_configure(3, &acker(3));
        assert_eq!(state.geometry(), Geometry::new(500, 400));
    }

    #[test]
    fn test_state_flags_decode_wire_array() {
        let mut bytes = Vec::new();
        for raw in [4u32, 5, 42] {
            bytes.extend_from_slice(&raw.to_ne_bytes());
        }
        let decoded = StateFlags::from_wire(&bytes);
        assert!(decoded.contains(StateFlag::Activated));
        assert!(decoded.contains(StateFlag::TiledLeft));
        assert_eq!(decoded.iter().count(), 2);
        assert!(decoded.is_resizing_context());
    }

    #[test]
    fn test_state_flags_decode_ignores_trailing_bytes() {
        let mut bytes = 3u32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2]);
        let decoded = StateFlags::from_wire(&bytes);
        assert_eq!(decoded, StateFlags::empty().with(StateFlag::Resizing));
    }

    #[test]
    fn test_geometry_buffer_sizes() {
        let geometry = Geometry::new(320, 200);
        assert_eq!(geometry.stride(), 1280);
        assert_eq!(geometry.byte_len(), 256_000);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    struct NullAck;
    impl ConfigureAck for NullAck {
        fn ack_configure(&self, _serial: u32) {}
    }

    fn non_trigger_flags() -> impl Strategy<Value = StateFlags> {
        proptest::collection::vec(
            prop_oneof![
                Just(StateFlag::Activated),
                Just(StateFlag::Fullscreen),
                Just(StateFlag::Suspended),
            ],
            0..4,
        )
        .prop_map(|list| list.into_iter().collect())
    }

    fn any_flags() -> impl Strategy<Value = StateFlags> {
        proptest::collection::vec(proptest::sample::select(StateFlag::ALL.to_vec()), 0..9)
            .prop_map(|list| list.into_iter().collect())
    }

    proptest! {
        #[test]
        fn prop_non_trigger_flags_leave_geometry(
            w in -10i32..5000, h in -10i32..5000, states in non_trigger_flags(), serial in any::<u32>()
        ) {
            let mut state = ToplevelState::new(Geometry::new(320, 200));
            state.handle_configure(GeometryUpdate::new(w, h, states), serial, &NullAck);
            prop_assert_eq!(state.geometry(), Geometry::new(320, 200));
            prop_assert_eq!(state.last_acked_serial(), Some(serial));
        }

        #[test]
        fn prop_zero_dimension_never_resizes(
            other in 0i32..5000, zero_width in any::<bool>(), states in any_flags()
        ) {
            let (w, h) = if zero_width { (0, other) } else { (other, 0) };
            let mut state = ToplevelState::new(Geometry::new(320, 200));
            state.handle_configure(GeometryUpdate::new(w, h, states), 1, &NullAck);
            prop_assert_eq!(state.geometry(), Geometry::new(320, 200));
        }

        #[test]
        fn prop_resizing_context_matches_trigger_membership(states in any_flags()) {
            let expected = states.iter().any(StateFlag::triggers_resize);
            prop_assert_eq!(states.is_resizing_context(), expected);
        }
    }
}
