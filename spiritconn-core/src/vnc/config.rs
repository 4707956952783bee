//! VNC session configuration

use std::time::Duration;

use secrecy::SecretString;

use crate::protocol::{Endpoint, SessionTarget};

/// Configuration for one VNC session
#[derive(Debug, Clone)]
pub struct VncSessionConfig {
    /// Where the handshake happens: outbound TCP or a reverse listener
    pub endpoint: Endpoint,

    /// Password for VNC authentication, if the server requires one
    pub password: Option<SecretString>,

    /// Preferred encodings in order of preference
    pub encodings: Vec<VncEncodingPref>,

    /// Allow shared session (multiple clients)
    pub shared: bool,

    /// View-only mode (no input forwarding)
    pub view_only: bool,

    /// Timeout for the TCP connect or reverse-connection accept
    pub connect_timeout: Duration,
}

impl Default for VncSessionConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::Tcp {
                host: String::new(),
                port: 5900,
            },
            password: None,
            encodings: vec![
                VncEncodingPref::Tight,
                VncEncodingPref::Zrle,
                VncEncodingPref::CopyRect,
                VncEncodingPref::Raw,
            ],
            shared: true,
            view_only: false,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl VncSessionConfig {
    /// Creates a configuration for an outbound TCP connection
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            endpoint: Endpoint::Tcp {
                host: host.into(),
                port,
            },
            ..Default::default()
        }
    }

    /// Creates a configuration for a reverse connection listener
    #[must_use]
    pub fn listen(port: u16) -> Self {
        Self {
            endpoint: Endpoint::Listen { port },
            ..Default::default()
        }
    }

    /// Sets the password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Sets view-only mode
    #[must_use]
    pub const fn with_view_only(mut self, view_only: bool) -> Self {
        self.view_only = view_only;
        self
    }

    /// Sets shared session mode
    #[must_use]
    pub const fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Builds a configuration from a resolved protocol-seam target.
    ///
    /// Tight carries both the compression and quality knobs on the wire, so
    /// the level pair only picks the encoding order: a fully lossless
    /// request prefers Raw, everything else prefers Tight.
    #[must_use]
    pub fn from_target(target: &SessionTarget) -> Self {
        let opts = &target.options;
        let encodings = if opts.compress_level == 0 && opts.quality_level >= 9 {
            vec![
                VncEncodingPref::Raw,
                VncEncodingPref::CopyRect,
                VncEncodingPref::Tight,
                VncEncodingPref::Zrle,
            ]
        } else {
            vec![
                VncEncodingPref::Tight,
                VncEncodingPref::Zrle,
                VncEncodingPref::CopyRect,
                VncEncodingPref::Raw,
            ]
        };

        Self {
            endpoint: target.endpoint.clone(),
            password: opts.password.clone(),
            encodings,
            shared: opts.shared,
            view_only: opts.view_only,
            connect_timeout: opts.connect_timeout,
        }
    }
}

/// VNC encoding preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VncEncodingPref {
    /// Raw encoding (uncompressed)
    Raw,
    /// `CopyRect` encoding (copy rectangle from another location)
    CopyRect,
    /// Tight encoding (compressed)
    Tight,
    /// ZRLE encoding (Zlib Run-Length Encoding)
    Zrle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SessionOptions;
    use secrecy::ExposeSecret;

    #[test]
    fn config_builder() {
        let config = VncSessionConfig::new("192.168.1.100", 5901)
            .with_password("secret")
            .with_view_only(true)
            .with_shared(false);

        assert_eq!(config.endpoint.to_string(), "192.168.1.100:5901");
        assert_eq!(
            config.password.as_ref().map(ExposeSecret::expose_secret),
            Some("secret")
        );
        assert!(config.view_only);
        assert!(!config.shared);
    }

    #[test]
    fn default_encodings_prefer_tight() {
        let config = VncSessionConfig::default();
        assert_eq!(config.encodings.first(), Some(&VncEncodingPref::Tight));
        assert!(config.encodings.contains(&VncEncodingPref::Raw));
    }

    #[test]
    fn lossless_target_prefers_raw() {
        let target = SessionTarget {
            endpoint: Endpoint::Tcp {
                host: "localhost".into(),
                port: 5900,
            },
            options: SessionOptions {
                compress_level: 0,
                quality_level: 9,
                ..Default::default()
            },
        };
        let config = VncSessionConfig::from_target(&target);
        assert_eq!(config.encodings.first(), Some(&VncEncodingPref::Raw));
    }
}
