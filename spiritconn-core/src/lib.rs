//! SpiritConn core: connection orchestration for a multi-session VNC client
//!
//! The crate owns everything between the host list and the wire: per-host
//! connection state, SSH tunnel workers, VNC handshake workers, and the
//! single-threaded poll loop that drives live sessions.
//!
//! # Architecture
//!
//! - [`models`] - host records and the atomic state flags shared with
//!   worker threads
//! - [`registry`] - ordered collection of host records
//! - [`protocol`] - the seam between the orchestrator and the VNC library
//! - [`vnc`] - production protocol backend on top of `vnc-rs`
//! - [`tunnel`] - SSH tunnel worker built on `russh`
//! - [`completion`] - cross-thread channel carrying handshake results back
//!   to the owner
//! - [`connect`] - the [`connect::SessionOrchestrator`], single-threaded
//!   owner of all of the above
//!
//! Threading follows one rule: the orchestrator's thread is the only place
//! registry and session state is mutated. Worker threads raise shared
//! atomic flags and post completion events, nothing more.

#![warn(missing_docs)]

pub mod completion;
pub mod connect;
pub mod models;
pub mod protocol;
pub mod registry;
pub mod tracing;
pub mod tunnel;
pub mod vnc;

pub use completion::{CompletionEvent, CompletionQueue, CompletionSender, ConnectOutcome};
pub use connect::{ConnectError, SessionOrchestrator, SessionStatus};
pub use models::{ConnectKind, HostId, HostRecord, SessionFlags, SshOptions, VncOptions};
pub use protocol::{
    Endpoint, PollOutcome, ProtocolConnector, ProtocolSession, SessionError, SessionOptions,
    SessionTarget,
};
pub use registry::HostRegistry;
pub use tunnel::{SshTunnel, TunnelConfig, TunnelError};
pub use vnc::{VncProtocol, VncSession, VncSessionConfig, VncSessionEvent};
