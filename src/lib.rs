//! # wayshim
//!
//! A client-side Wayland windowing shim: it negotiates capabilities with the
//! compositor, gives one surface a toplevel role, follows compositor-driven
//! resizes and gets pixels on screen through one of two presentation
//! backends.
//!
//! ## Architecture
//!
//! - `session`: the connection, global discovery and the capability registry
//! - `shell`: shell selection (xdg_wm_base over wl_shell), the toplevel
//!   state machine and ping/pong
//! - `decoration`: optional server-side decoration request
//! - `present`: the presentation interface with shm and GPU variants
//! - `window`: ties the above together for one surface
//! - `config`: TOML configuration
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wayshim::{Session, ShimConfig, Window};
//!
//! fn main() -> wayshim::Result<()> {
//!     let config = ShimConfig::default();
//!     let mut session = Session::connect()?;
//!     session.discover_globals()?;
//!     let mut window = Window::new(&mut session, &config)?;
//!     while window.is_open() {
//!         window.poll(&mut session)?;
//!         if let Some(mut frame) = window.framebuffer() {
//!             frame.fill(wayshim::present::Rgba::opaque(40, 40, 60));
//!         }
//!         window.present()?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decoration;
pub mod error;
pub mod logging;
pub mod present;
pub mod session;
pub mod shell;
pub mod window;

// Re-export main types for easy access
pub use config::ShimConfig;
pub use decoration::DecorationMode;
pub use error::{Result, ShimError};
pub use present::{BackendKind, PresentationBackend};
pub use session::registry::Capability;
pub use session::Session;
pub use shell::{Geometry, ShellKind};
pub use window::Window;

/// Version information for wayshim
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
