//! SSH tunnel configuration

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::models::HostRecord;

/// Configuration for one SSH tunnel
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// SSH server hostname or IP address
    pub host: String,

    /// SSH server port
    pub port: u16,

    /// SSH user name
    pub user: String,

    /// Password, if password authentication is offered
    pub password: Option<SecretString>,

    /// Path to the private key file, if public-key authentication is offered
    pub key_path: Option<PathBuf>,

    /// Passphrase for the private key file
    pub key_passphrase: Option<SecretString>,

    /// Host the forwarded channel targets, as seen from the SSH server
    pub target_host: String,

    /// Port the forwarded channel targets
    pub target_port: u16,

    /// Timeout for the TCP connect to the SSH server
    pub connect_timeout: Duration,

    /// Display name used in log lines
    pub label: String,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            user: String::new(),
            password: None,
            key_path: None,
            key_passphrase: None,
            target_host: "localhost".into(),
            target_port: 5900,
            connect_timeout: Duration::from_secs(20),
            label: String::new(),
        }
    }
}

impl TunnelConfig {
    /// Builds a tunnel configuration from a host record.
    ///
    /// Returns `None` when the record carries no SSH options. The forwarded
    /// channel targets `localhost` on the record's VNC port, matching a VNC
    /// server that listens only on the SSH host's loopback.
    #[must_use]
    pub fn from_record(record: &HostRecord) -> Option<Self> {
        let ssh = record.ssh.as_ref()?;
        Some(Self {
            host: ssh.host.clone().unwrap_or_else(|| record.address.clone()),
            port: ssh.port,
            user: ssh.user.clone(),
            password: ssh.password.clone(),
            key_path: ssh.key_path.clone(),
            key_passphrase: ssh.key_passphrase.clone(),
            target_host: "localhost".into(),
            target_port: record.vnc_port,
            connect_timeout: Duration::from_secs(20),
            label: record.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SshOptions;

    #[test]
    fn from_record_without_ssh_is_none() {
        let record = HostRecord::new("plain", "10.0.0.5");
        assert!(TunnelConfig::from_record(&record).is_none());
    }

    #[test]
    fn from_record_defaults_ssh_host_to_address() {
        let record = HostRecord::new("lab", "10.0.0.9")
            .with_vnc_port(5901)
            .with_ssh(SshOptions {
                user: "admin".into(),
                ..Default::default()
            });
        let config = TunnelConfig::from_record(&record).expect("ssh options");
        assert_eq!(config.host, "10.0.0.9");
        assert_eq!(config.port, 22);
        assert_eq!(config.target_host, "localhost");
        assert_eq!(config.target_port, 5901);
        assert_eq!(config.label, "lab");
    }
}
