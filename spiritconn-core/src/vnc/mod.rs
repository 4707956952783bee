//! Pure Rust VNC protocol backend
//!
//! Implements the [`crate::protocol`] seam on top of the `vnc-rs` crate.
//! Each session runs the async protocol in a dedicated background thread
//! with its own Tokio runtime and communicates with the owner through
//! `std::sync::mpsc` channels, so the owner never needs a runtime of its
//! own to drive a live session.

mod config;
mod error;
mod event;
mod session;

pub use config::{VncEncodingPref, VncSessionConfig};
pub use error::VncError;
pub use event::{VncInput, VncRect, VncSessionEvent};
pub use session::{VncProtocol, VncSession};
