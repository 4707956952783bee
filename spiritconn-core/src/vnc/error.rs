//! VNC session error types

use thiserror::Error;

use crate::protocol::SessionError;

/// Error type for VNC session operations
#[derive(Debug, Error, Clone)]
pub enum VncError {
    /// Connection to the VNC server failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Protocol error during VNC communication
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// IO error during network operations
    #[error("IO error: {0}")]
    Io(String),

    /// Session is already closed
    #[error("Session closed")]
    Closed,

    /// Connection setup timed out
    #[error("Connection timed out")]
    Timeout,
}

impl From<std::io::Error> for VncError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<VncError> for SessionError {
    fn from(err: VncError) -> Self {
        match err {
            VncError::AuthenticationFailed(msg) => Self::AuthenticationFailed(msg),
            VncError::Io(msg) => Self::Io(msg),
            VncError::Timeout => Self::Timeout,
            VncError::ConnectionFailed(msg) | VncError::Protocol(msg) => {
                Self::ConnectionFailed(msg)
            }
            VncError::Closed => Self::ConnectionFailed("session closed".into()),
        }
    }
}
