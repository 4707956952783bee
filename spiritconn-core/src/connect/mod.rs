//! Connection orchestration
//!
//! The [`SessionOrchestrator`] is the single-threaded owner of all session
//! state. It starts worker threads for connection setup (SSH tunnel plus
//! protocol handshake), drains their completions, polls live sessions for
//! messages, and tears attempts down idempotently. Worker threads never
//! touch the registry; they communicate through shared atomic flags and the
//! completion channel.

mod manager;

use thiserror::Error;

use crate::models::HostId;

pub use manager::{NoticeHook, RedrawHook, SessionOrchestrator, StatusHook};

/// Connection status of one host, derived from its state flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No connection attempt yet
    Idle,
    /// Connection setup in progress
    Connecting,
    /// Session live
    Connected,
    /// The last attempt failed
    Failed,
    /// The last attempt was torn down
    Ended,
}

/// Error starting a connection attempt
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The id does not name a registered host
    #[error("unknown host {0}")]
    UnknownHost(HostId),

    /// A tunneled connection was requested without SSH options
    #[error("host '{0}' has no SSH options")]
    MissingSshOptions(String),

    /// The OS refused to spawn a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
