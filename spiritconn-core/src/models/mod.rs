//! Core data structures: host records, connection kinds, session state flags
//!
//! A [`HostRecord`] is one entry in the host registry: identity and
//! credentials from configuration plus the runtime connection state shared
//! with worker threads through [`SessionFlags`].

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a host record
pub type HostId = Uuid;

/// How the session reaches the VNC server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectKind {
    /// Plain VNC connection to the remote host
    #[default]
    Vnc,
    /// VNC through an SSH tunnel to the remote host
    VncOverSsh,
    /// Reverse connection: the server connects to us
    Listen,
}

/// Per-host VNC options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VncOptions {
    /// VNC password, if the server requires one
    #[serde(skip)]
    pub password: Option<SecretString>,
    /// Compression level (0-9)
    pub compress_level: u8,
    /// Quality level (0-9)
    pub quality_level: u8,
    /// Allow shared sessions
    pub shared: bool,
    /// View-only mode (no input forwarding)
    pub view_only: bool,
}

impl Default for VncOptions {
    fn default() -> Self {
        Self {
            password: None,
            compress_level: 5,
            quality_level: 5,
            shared: true,
            view_only: false,
        }
    }
}

/// Per-host SSH options, present when the connection kind is tunneled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshOptions {
    /// SSH host; defaults to the record's remote address when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// SSH port
    pub port: u16,
    /// SSH user name
    pub user: String,
    /// SSH password, if password authentication is offered
    #[serde(skip)]
    pub password: Option<SecretString>,
    /// Path to the private key file, if public-key authentication is offered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
    /// Passphrase for the private key file
    #[serde(skip)]
    pub key_passphrase: Option<SecretString>,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            host: None,
            port: 22,
            user: String::new(),
            password: None,
            key_path: None,
            key_passphrase: None,
        }
    }
}

/// Session state flags shared between the owner loop and worker threads
///
/// Single-writer discipline: worker threads write only their liveness and
/// readiness signals (`worker_running`, `ssh_ready`, the tunnel worker's
/// `has_error`) and clear `stop_ssh` on exit. Every connection-state flag
/// is written by the owner thread, when it starts an attempt, drains a
/// worker completion, or tears a session down — a late handshake from a
/// torn-down attempt therefore cannot disturb the record.
#[derive(Debug, Default)]
pub struct SessionFlags {
    /// Connection attempt in progress
    pub connecting: AtomicBool,
    /// Handshake completed, session live
    pub connected: AtomicBool,
    /// Connected but not yet attached to a viewer
    pub waiting_for_show: AtomicBool,
    /// A hard error occurred during setup or transport
    pub has_error: AtomicBool,
    /// The connection attempt failed
    pub couldnt_connect: AtomicBool,
    /// User or shutdown requested a disconnect
    pub disconnect_requested: AtomicBool,
    /// This connection attempt is over; cleared on the next connect
    pub ended: AtomicBool,
    /// The protocol handshake worker thread is running
    pub worker_running: AtomicBool,
    /// The SSH tunnel's loopback listener is accepting connections
    pub ssh_ready: AtomicBool,
    /// Cooperative stop request for the tunnel worker
    pub stop_ssh: AtomicBool,
}

impl SessionFlags {
    /// Clears every flag ahead of a new connection attempt and marks the
    /// record as connecting. Owner thread only.
    pub fn reset_for_connect(&self) {
        self.connecting.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.waiting_for_show.store(false, Ordering::SeqCst);
        self.has_error.store(false, Ordering::SeqCst);
        self.couldnt_connect.store(false, Ordering::SeqCst);
        self.disconnect_requested.store(false, Ordering::SeqCst);
        self.ended.store(false, Ordering::SeqCst);
        self.ssh_ready.store(false, Ordering::SeqCst);
        self.stop_ssh.store(false, Ordering::SeqCst);
    }

    /// Marks a successful handshake. Owner thread only, on draining a
    /// current-generation completion.
    pub fn mark_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.connecting.store(false, Ordering::SeqCst);
        self.waiting_for_show.store(true, Ordering::SeqCst);
    }

    /// Marks a failed connection attempt. Owner thread only, on draining a
    /// current-generation completion.
    pub fn mark_couldnt_connect(&self, hard_error: bool) {
        self.connecting.store(false, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.couldnt_connect.store(true, Ordering::SeqCst);
        if hard_error {
            self.has_error.store(true, Ordering::SeqCst);
        }
    }

    /// True while a connection attempt is in progress
    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    /// True while the session is live
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// True once the connection attempt has been torn down
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

/// One configured host: identity, credentials, and live connection state
///
/// Lifetime matches the host list entry: created at config load or "add
/// host", destroyed at host removal or shutdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRecord {
    /// Stable identity of this record
    pub id: HostId,
    /// Display name
    pub name: String,
    /// Remote address (host name or IP)
    pub address: String,
    /// Remote VNC port
    pub vnc_port: u16,
    /// How the session reaches the server
    pub kind: ConnectKind,
    /// VNC codec/credential options
    pub vnc: VncOptions,
    /// SSH options; required when `kind` is [`ConnectKind::VncOverSsh`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh: Option<SshOptions>,

    /// State flags shared with worker threads
    #[serde(skip)]
    pub flags: Arc<SessionFlags>,
    /// Negotiated loopback port for the tunnel (0 = none)
    #[serde(skip)]
    pub local_port: Arc<AtomicU16>,
    /// Seconds since the last inbound protocol message; reset by the poll
    /// loop, incremented by the supervisor tick
    #[serde(skip)]
    pub inactive_seconds: Arc<AtomicU32>,
    /// Connection attempt generation; bumped on teardown so stale worker
    /// completions are recognized and discarded
    #[serde(skip)]
    pub generation: u64,
}

impl HostRecord {
    /// Creates a new record for a direct VNC connection
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: address.into(),
            vnc_port: 5900,
            kind: ConnectKind::Vnc,
            vnc: VncOptions::default(),
            ssh: None,
            flags: Arc::new(SessionFlags::default()),
            local_port: Arc::new(AtomicU16::new(0)),
            inactive_seconds: Arc::new(AtomicU32::new(0)),
            generation: 0,
        }
    }

    /// Sets the VNC port
    #[must_use]
    pub const fn with_vnc_port(mut self, port: u16) -> Self {
        self.vnc_port = port;
        self
    }

    /// Sets the connection kind
    #[must_use]
    pub const fn with_kind(mut self, kind: ConnectKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the VNC password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.vnc.password = Some(SecretString::from(password.into()));
        self
    }

    /// Sets the SSH options and switches the kind to tunneled
    #[must_use]
    pub fn with_ssh(mut self, ssh: SshOptions) -> Self {
        self.ssh = Some(ssh);
        self.kind = ConnectKind::VncOverSsh;
        self
    }

    /// The SSH host to dial: the configured override, or the remote address
    #[must_use]
    pub fn ssh_host(&self) -> Option<String> {
        self.ssh
            .as_ref()
            .map(|s| s.host.clone().unwrap_or_else(|| self.address.clone()))
    }

    /// Resets the inactivity counter (a protocol message arrived)
    pub fn touch(&self) {
        self.inactive_seconds.store(0, Ordering::SeqCst);
    }
}
