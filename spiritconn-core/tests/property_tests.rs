//! Property tests for configuration mapping and state-flag invariants

use proptest::prelude::*;

use spiritconn_core::models::{ConnectKind, HostRecord, SessionFlags, SshOptions};
use spiritconn_core::protocol::{Endpoint, SessionOptions, SessionTarget};
use spiritconn_core::vnc::{VncEncodingPref, VncSessionConfig};

fn arb_host() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("localhost".to_string()),
        Just("127.0.0.1".to_string()),
        "[a-z]{3,10}\\.[a-z]{2,4}",
        "192\\.168\\.[0-9]{1,3}\\.[0-9]{1,3}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_level_pair_yields_all_four_encodings(
        compress in 0u8..=9,
        quality in 0u8..=9,
        host in arb_host(),
        port in 1024u16..65535,
    ) {
        let target = SessionTarget {
            endpoint: Endpoint::Tcp { host, port },
            options: SessionOptions {
                compress_level: compress,
                quality_level: quality,
                ..Default::default()
            },
        };
        let config = VncSessionConfig::from_target(&target);

        prop_assert_eq!(config.encodings.len(), 4);
        for pref in [
            VncEncodingPref::Raw,
            VncEncodingPref::CopyRect,
            VncEncodingPref::Tight,
            VncEncodingPref::Zrle,
        ] {
            prop_assert!(config.encodings.contains(&pref));
        }

        let lossless = compress == 0 && quality >= 9;
        prop_assert_eq!(
            config.encodings.first() == Some(&VncEncodingPref::Raw),
            lossless
        );
    }

    #[test]
    fn tcp_endpoint_display_keeps_host_and_port(
        host in arb_host(),
        port in 1u16..=u16::MAX,
    ) {
        let endpoint = Endpoint::Tcp { host: host.clone(), port };
        let shown = endpoint.to_string();
        let suffix = format!(":{}", port);
        prop_assert!(shown.starts_with(&host));
        prop_assert!(shown.ends_with(&suffix));
    }

    #[test]
    fn flags_never_show_connected_and_connecting_together(
        ops in prop::collection::vec(0u8..3, 1..40),
    ) {
        let flags = SessionFlags::default();
        for op in ops {
            match op {
                0 => flags.reset_for_connect(),
                1 => flags.mark_connected(),
                _ => flags.mark_couldnt_connect(op % 2 == 0),
            }
            prop_assert!(
                !(flags.is_connected() && flags.is_connecting()),
                "connected and connecting must be disjoint"
            );
        }
    }

    #[test]
    fn record_roundtrip_preserves_identity_and_drops_secrets(
        name in "[a-z]{1,12}",
        host in arb_host(),
        port in 1u16..=u16::MAX,
    ) {
        let record = HostRecord::new(name.clone(), host.clone())
            .with_vnc_port(port)
            .with_password("vnc-secret")
            .with_ssh(SshOptions {
                user: "admin".into(),
                password: Some("ssh-secret".into()),
                ..Default::default()
            });

        let json = serde_json::to_string(&record).expect("serialize");
        prop_assert!(!json.contains("vnc-secret"));
        prop_assert!(!json.contains("ssh-secret"));

        let restored: HostRecord = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(restored.id, record.id);
        prop_assert_eq!(restored.name, name);
        prop_assert_eq!(restored.address, host);
        prop_assert_eq!(restored.vnc_port, port);
        prop_assert_eq!(restored.kind, ConnectKind::VncOverSsh);
        prop_assert!(restored.vnc.password.is_none());
        prop_assert!(restored.ssh.expect("ssh options").password.is_none());
    }
}
