//! Remote-protocol library boundary
//!
//! The orchestrator never talks to a VNC library directly; it drives
//! sessions through the [`ProtocolConnector`] / [`ProtocolSession`] pair.
//! The production implementation lives in [`crate::vnc`]; tests substitute
//! doubles so connection scenarios run without a VNC server.

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Error type at the protocol seam
#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// Connection or handshake with the server failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Server rejected the supplied credential
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// IO error during connection setup
    #[error("IO error: {0}")]
    Io(String),

    /// Connection setup timed out
    #[error("Connection timed out")]
    Timeout,
}

/// Where the protocol handshake should be performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Outbound TCP connection (direct host, or the tunnel's loopback port)
    Tcp {
        /// Target hostname or IP address
        host: String,
        /// Target port
        port: u16,
    },
    /// Reverse connection: wait for the server to connect to us
    Listen {
        /// Local port to listen on
        port: u16,
    },
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
            Self::Listen { port } => write!(f, "listen:{port}"),
        }
    }
}

/// Codec and credential options handed to the protocol library
///
/// The core treats these as opaque configuration; only the library
/// interprets compression/quality levels.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Stored credential, returned through the library's password callback
    pub password: Option<SecretString>,
    /// Compression level (0-9)
    pub compress_level: u8,
    /// Quality level (0-9)
    pub quality_level: u8,
    /// Allow shared sessions (multiple clients on one server)
    pub shared: bool,
    /// View-only mode (no input forwarding)
    pub view_only: bool,
    /// Timeout for the blocking connection setup
    pub connect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            password: None,
            compress_level: 5,
            quality_level: 5,
            shared: true,
            view_only: false,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// A fully resolved connection request for the protocol library
#[derive(Debug, Clone)]
pub struct SessionTarget {
    /// Endpoint to handshake against
    pub endpoint: Endpoint,
    /// Opaque codec/credential options
    pub options: SessionOptions,
}

/// Result of one non-blocking message check on a live session
#[derive(Debug)]
pub enum PollOutcome {
    /// Nothing pending
    Idle,
    /// One pending message was read and dispatched
    Message,
    /// The remote side closed the session in an orderly fashion
    Ended,
    /// A protocol-level fatal error occurred
    Error(String),
}

/// A live protocol session produced by a successful handshake
///
/// Handles cross the completion channel from the handshake worker thread to
/// the owner, so implementations must be `Send`.
pub trait ProtocolSession: Send + 'static {
    /// Performs one zero-timeout check for a pending server message,
    /// dispatching it if present. Never blocks.
    fn poll(&mut self) -> PollOutcome;

    /// Releases the session and every resource it owns. Idempotent.
    fn close(&mut self);
}

/// Factory for protocol sessions
///
/// `connect` blocks for the duration of connection setup, which is why the
/// orchestrator always calls it from a dedicated worker thread.
pub trait ProtocolConnector: Send + Sync + 'static {
    /// Session type produced on handshake success
    type Session: ProtocolSession;

    /// Performs the blocking protocol handshake against `target`.
    ///
    /// # Errors
    /// Returns an error if the connection, handshake, or authentication
    /// fails.
    fn connect(&self, target: &SessionTarget) -> Result<Self::Session, SessionError>;
}
