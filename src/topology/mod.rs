//! Cluster topology model
//!
//! The descriptor is a YAML document:
//!
//! ```yaml
//! version: v1
//! network_backend: vxlan
//! nodes:
//!   - mac: "00:25:90:c0:f6:ee"
//!     kube_master: true
//!     etcd_member: true
//!   - mac: "00:25:90:c0:f6:d6"
//!     hostname: worker-0
//!     overrides:
//!       disk: /dev/sdb
//! ssh_authorized_keys:
//!   - ssh-ed25519 AAAA... admin@example
//! vars:
//!   kube_version: v1.31.0
//! ```
//!
//! Unknown fields are rejected at every level except inside `vars` and
//! `overrides`, which are free-form.

mod mac;
mod types;
mod validate;

pub use mac::{InvalidMacAddress, MacAddress};
pub use types::{ClusterTopology, NetworkBackend, NodeSpec, SchemaVersion};
pub use validate::validate;

use crate::{Error, Result};

/// Decode a descriptor into a topology
///
/// Purely structural: wrong types, missing required fields, unknown fields,
/// an unsupported schema version or a malformed MAC address all fail with
/// [`Error::Format`]. Cluster policy is checked separately by [`validate`].
pub fn parse_topology(raw: &[u8]) -> Result<ClusterTopology> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| Error::format(format!("descriptor is not valid UTF-8: {}", e)))?;
    Ok(serde_yaml::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"
version: v1
network_backend: vxlan
nodes:
  - mac: "00:25:90:C0:F6:EE"
    kube_master: true
    etcd_member: true
  - mac: "00-25-90-c0-f6-d6"
    hostname: worker-0
    overrides:
      disk: /dev/sdb
ssh_authorized_keys:
  - ssh-ed25519 AAAAC3Nza admin@example
vars:
  kube_version: v1.31.0
  dns: [10.0.0.2, 10.0.0.3]
"#;

    #[test]
    fn story_parses_full_descriptor() {
        let t = parse_topology(DESCRIPTOR.as_bytes()).expect("descriptor should parse");
        assert_eq!(t.version, SchemaVersion::V1);
        assert_eq!(t.backend().unwrap(), NetworkBackend::Vxlan);
        assert_eq!(t.nodes.len(), 2);
        assert_eq!(t.nodes[0].mac.to_string(), "00:25:90:c0:f6:ee");
        assert!(t.nodes[0].kube_master && t.nodes[0].etcd_member);
        assert_eq!(t.nodes[1].hostname(), "worker-0");
        assert!(!t.nodes[1].ingress);
        assert_eq!(
            t.nodes[1].overrides["disk"],
            serde_yaml::Value::String("/dev/sdb".to_string())
        );
        assert_eq!(t.ssh_authorized_keys.len(), 1);
        assert!(t.vars.contains_key("dns"));
    }

    #[test]
    fn story_version_defaults_and_legacy_backend_key_is_accepted() {
        let t = parse_topology(b"flannel_backend: host-gw\n").unwrap();
        assert_eq!(t.version, SchemaVersion::V1);
        assert_eq!(t.network_backend, "host-gw");
        assert!(t.nodes.is_empty());
    }

    #[test]
    fn story_unsupported_backend_is_not_a_format_error() {
        let t = parse_topology(b"network_backend: token-ring\n").unwrap();
        assert!(t.backend().is_err());
    }

    #[test]
    fn story_unknown_field_is_rejected() {
        let err = parse_topology(b"network_backend: udp\ncoreos_channel: beta\n").unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn story_unknown_node_field_is_rejected() {
        let raw = b"network_backend: udp\nnodes:\n  - mac: \"aa:bb:cc:dd:ee:ff\"\n    gpu: true\n";
        assert!(matches!(parse_topology(raw), Err(Error::Format { .. })));
    }

    #[test]
    fn story_unsupported_version_is_rejected() {
        let err = parse_topology(b"version: v2\nnetwork_backend: udp\n").unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn story_invalid_mac_is_a_format_error() {
        let raw = b"network_backend: udp\nnodes:\n  - mac: \"zz:bb:cc:dd:ee:ff\"\n";
        let err = parse_topology(raw).unwrap_err();
        assert!(err.to_string().contains("zz:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn story_wrong_types_are_format_errors() {
        let raw = b"network_backend: udp\nnodes:\n  - mac: \"aa:bb:cc:dd:ee:ff\"\n    kube_master: maybe\n";
        assert!(matches!(parse_topology(raw), Err(Error::Format { .. })));
        assert!(matches!(
            parse_topology(b"- just\n- a list\n"),
            Err(Error::Format { .. })
        ));
    }

    #[test]
    fn story_missing_backend_is_a_format_error() {
        assert!(matches!(
            parse_topology(b"nodes: []\n"),
            Err(Error::Format { .. })
        ));
    }

    #[test]
    fn story_non_utf8_input_is_a_format_error() {
        assert!(matches!(
            parse_topology(&[0xff, 0xfe, 0x00]),
            Err(Error::Format { .. })
        ));
    }
}
