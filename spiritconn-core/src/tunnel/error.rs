//! SSH tunnel error types

use thiserror::Error;

/// Error type for SSH tunnel operations
#[derive(Debug, Error)]
pub enum TunnelError {
    /// TCP connection to the SSH server failed. Not a hard error: the
    /// server may simply be down or unreachable right now.
    #[error("Could not connect to SSH server: {0}")]
    Connect(String),

    /// SSH protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// The private key file could not be read or parsed
    #[error("Could not open the public or private SSH key file")]
    KeyFile(#[source] russh_keys::Error),

    /// Every offered authentication method failed
    #[error("All supported authentication methods failed")]
    AuthenticationFailed,

    /// The direct-tcpip channel could not be opened
    #[error("Could not open the direct-TCP/IP channel: {0}")]
    ChannelOpen(String),

    /// IO error on the listener or forwarded socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection setup timed out
    #[error("SSH connection timed out")]
    Timeout,
}

impl TunnelError {
    /// Whether this failure should raise the record's hard-error flag.
    /// A plain connect failure leaves the record state untouched.
    #[must_use]
    pub const fn is_hard(&self) -> bool {
        !matches!(self, Self::Connect(_) | Self::Timeout)
    }
}
