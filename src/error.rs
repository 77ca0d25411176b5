//! Error taxonomy for the windowing shim
//!
//! Every setup failure is fatal and surfaces to the caller unchanged; nothing
//! here is retried. Per-event anomalies never become a `ShimError`, they are
//! logged at the point of dispatch and ignored.

use thiserror::Error;

use crate::session::registry::Capability;

/// Errors raised while bringing up a session, a window or a presentation backend
#[derive(Debug, Error)]
pub enum ShimError {
    /// No compositor reachable on the configured socket
    #[error("no compositor reachable: {0}")]
    Connection(String),

    /// A required global was not advertised during discovery
    #[error("required global `{}` not advertised by the compositor", .capability.interface())]
    MissingCapability { capability: Capability },

    /// Neither xdg_wm_base nor wl_shell was advertised
    #[error("no shell available: compositor advertises neither xdg_wm_base nor wl_shell")]
    NoShellAvailable,

    /// The graphics stack refused to create a drawable
    #[error("surface creation failed: {0}")]
    SurfaceCreation(String),

    /// The graphics stack refused to create a rendering context
    #[error("context creation failed: {0}")]
    ContextCreation(String),

    /// The shared-memory backing store could not be allocated or mapped
    #[error("buffer allocation failed: {0}")]
    BufferAllocation(String),

    /// XDG_RUNTIME_DIR is unset; the shm backend has nowhere to put its backing file
    #[error("XDG_RUNTIME_DIR is not set; cannot allocate shared-memory buffers")]
    MissingRuntimeDir,

    /// A second session was requested while one is alive
    #[error("a session is already active in this process")]
    SessionExists,

    /// Global discovery was requested twice on the same session
    #[error("global discovery already completed for this session")]
    AlreadyDiscovered,

    /// Discovery has not run yet, capabilities cannot be read
    #[error("global discovery has not completed")]
    NotDiscovered,

    /// Reading, flushing or dispatching the connection failed
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// The requested presentation backend is not compiled into this build
    #[error("presentation backend `{0}` is not available in this build")]
    UnsupportedBackend(&'static str),
}

impl ShimError {
    /// Process exit code for this failure. Zero is reserved for a close-driven exit.
    pub fn exit_code(&self) -> u8 {
        match self {
            ShimError::Connection(_) => 2,
            ShimError::MissingCapability { .. } => 3,
            ShimError::NoShellAvailable => 4,
            ShimError::SurfaceCreation(_) | ShimError::ContextCreation(_) => 5,
            ShimError::BufferAllocation(_) | ShimError::MissingRuntimeDir => 6,
            ShimError::UnsupportedBackend(_) => 7,
            ShimError::SessionExists
            | ShimError::AlreadyDiscovered
            | ShimError::NotDiscovered
            | ShimError::Dispatch(_) => 1,
        }
    }
}

impl From<wayland_client::ConnectError> for ShimError {
    fn from(err: wayland_client::ConnectError) -> Self {
        ShimError::Connection(err.to_string())
    }
}

impl From<wayland_client::DispatchError> for ShimError {
    fn from(err: wayland_client::DispatchError) -> Self {
        ShimError::Dispatch(err.to_string())
    }
}

impl From<wayland_backend::client::WaylandError> for ShimError {
    fn from(err: wayland_backend::client::WaylandError) -> Self {
        ShimError::Dispatch(err.to_string())
    }
}

pub type Result<T, E = ShimError> = std::result::Result<T, E>;
