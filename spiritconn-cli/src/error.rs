//! CLI error types and exit codes.

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, validation, or other non-connection errors
    pub const GENERAL_ERROR: i32 = 1;
    /// Connection failure - the session could not be established or died
    pub const CONNECTION_FAILURE: i32 = 2;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration or argument error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The connection attempt failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<spiritconn_core::ConnectError> for CliError {
    fn from(err: spiritconn_core::ConnectError) -> Self {
        Self::Config(err.to_string())
    }
}

impl CliError {
    /// Maps the error to a process exit code
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Connection(_) => exit_codes::CONNECTION_FAILURE,
            Self::Config(_) | Self::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }
}
