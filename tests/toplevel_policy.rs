// Toplevel policy integration tests
//
// Drives the public toplevel state machine through configure sequences the
// way the xdg and wl_shell listeners do, recording every acknowledgement.

use std::cell::RefCell;

use wayshim::shell::{
    ConfigureAck, ConfigureOutcome, Geometry, GeometryUpdate, StateFlag, StateFlags,
    ToplevelPhase, ToplevelState,
};

#[derive(Default)]
struct RecordingAck {
    serials: RefCell<Vec<u32>>,
}

impl ConfigureAck for RecordingAck {
    fn ack_configure(&self, serial: u32) {
        self.serials.borrow_mut().push(serial);
    }
}

fn flags(list: &[StateFlag]) -> StateFlags {
    list.iter().copied().collect()
}

fn wire(raw: &[u32]) -> Vec<u8> {
    raw.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// A window that has already consumed its initial resize
fn settled(width: i32, height: i32) -> ToplevelState {
    let mut state = ToplevelState::new(Geometry::new(width, height));
    assert_eq!(state.take_resize(), Some(Geometry::new(width, height)));
    state
}

#[test]
fn test_activation_then_tiling_sequence() {
    let ack = RecordingAck::default();
    let mut state = settled(320, 200);

    // Compositor maps the window: activated, compositor-chosen size ignored
    state.stage(GeometryUpdate::new(
        800,
        600,
        StateFlags::from_wire(&wire(&[4])),
    ));
    assert_eq!(state.commit_configure(10, &ack), ConfigureOutcome::Unchanged);
    assert_eq!(state.phase(), ToplevelPhase::Configured);
    assert_eq!(state.take_resize(), None);

    // Fullscreen + activated still does not resize
    state.stage(GeometryUpdate::new(
        800,
        600,
        flags(&[StateFlag::Activated, StateFlag::Fullscreen]),
    ));
    state.commit_configure(11, &ack);
    assert_eq!(state.geometry(), Geometry::new(320, 200));

    // Tiled to the left half
    state.stage(GeometryUpdate::new(
        640,
        480,
        StateFlags::from_wire(&wire(&[4, 5])),
    ));
    assert_eq!(
        state.commit_configure(12, &ack),
        ConfigureOutcome::Resized(Geometry::new(640, 480))
    );
    assert_eq!(state.take_resize(), Some(Geometry::new(640, 480)));

    assert_eq!(*ack.serials.borrow(), vec![10, 11, 12]);
    assert_eq!(state.last_acked_serial(), Some(12));
    assert_eq!(state.configure_count(), 3);
}

#[test]
fn test_interactive_resize_tracks_every_step() {
    let ack = RecordingAck::default();
    let mut state = settled(320, 200);
    let resizing = flags(&[StateFlag::Resizing, StateFlag::Activated]);

    for (serial, width) in (100u32..).zip([330, 345, 360, 400]) {
        state.handle_configure(GeometryUpdate::new(width, 220, resizing), serial, &ack);
    }
    assert_eq!(state.geometry(), Geometry::new(400, 220));
    // Only the latest geometry is handed to the backend
    assert_eq!(state.take_resize(), Some(Geometry::new(400, 220)));
    assert_eq!(ack.serials.borrow().len(), 4);
}

#[test]
fn test_close_with_pending_resize_stops_everything() {
    let ack = RecordingAck::default();
    let mut state = settled(320, 200);

    state.handle_configure(
        GeometryUpdate::new(1024, 768, flags(&[StateFlag::Maximized])),
        1,
        &ack,
    );
    assert!(state.resize_pending());

    state.handle_close();
    assert!(!state.is_open());

    // Events already queued behind the close
    state.stage(GeometryUpdate::new(
        500,
        500,
        flags(&[StateFlag::Resizing]),
    ));
    assert_eq!(state.commit_configure(2, &ack), ConfigureOutcome::Dropped);
    assert_eq!(state.handle_legacy_configure(700, 700), ConfigureOutcome::Dropped);

    assert_eq!(state.geometry(), Geometry::new(1024, 768));
    assert_eq!(state.take_resize(), None);
    assert_eq!(*ack.serials.borrow(), vec![1]);
}

#[test]
fn test_legacy_and_modern_paths_differ_on_flagless_sizes() {
    let ack = RecordingAck::default();

    let mut modern = settled(320, 200);
    modern.handle_configure(GeometryUpdate::new(800, 600, StateFlags::empty()), 1, &ack);
    assert_eq!(modern.geometry(), Geometry::new(320, 200));

    let mut legacy = settled(320, 200);
    legacy.handle_legacy_configure(800, 600);
    assert_eq!(legacy.geometry(), Geometry::new(800, 600));
    assert!(legacy.resize_pending());
}

#[test]
fn test_unknown_and_truncated_states_degrade_gracefully() {
    let mut bytes = wire(&[42, 3]);
    bytes.push(0xff);
    let states = StateFlags::from_wire(&bytes);
    assert!(states.contains(StateFlag::Resizing));
    assert!(states.is_resizing_context());

    let mut state = settled(320, 200);
    state.handle_configure(
        GeometryUpdate::new(333, 222, states),
        5,
        &RecordingAck::default(),
    );
    assert_eq!(state.geometry(), Geometry::new(333, 222));
}
