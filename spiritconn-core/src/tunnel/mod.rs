//! SSH tunnel for tunneled VNC sessions
//!
//! One [`SshTunnel`] per tunneled connection attempt: a background thread
//! with its own Tokio runtime dials the SSH server, authenticates, opens a
//! loopback listener, and relays the single forwarded connection through a
//! direct-tcpip channel. The owner observes progress through the shared
//! [`crate::models::SessionFlags`] (`ssh_ready`, `stop_ssh`) and the
//! negotiated loopback port, never by joining the thread.

mod config;
mod error;
mod relay;
mod worker;

pub use config::TunnelConfig;
pub use error::TunnelError;
pub use relay::{RelayEnd, relay};
pub use worker::SshTunnel;
