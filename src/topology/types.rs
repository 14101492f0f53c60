//! Cluster descriptor schema

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::mac::MacAddress;

/// Descriptor schema version
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaVersion {
    /// First and only schema revision
    #[default]
    #[serde(rename = "v1")]
    V1,
}

/// Supported flannel network backends
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkBackend {
    /// Direct routes between hosts on the same L2 segment
    HostGw,
    /// Userspace UDP encapsulation
    Udp,
    /// Kernel VXLAN encapsulation
    Vxlan,
}

impl NetworkBackend {
    /// All supported selector values
    pub const SUPPORTED: [&'static str; 3] = ["host-gw", "udp", "vxlan"];

    /// Returns true if this is a supported selector string
    pub fn is_valid(s: &str) -> bool {
        s.parse::<Self>().is_ok()
    }

    /// Selector string as written in descriptors
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HostGw => "host-gw",
            Self::Udp => "udp",
            Self::Vxlan => "vxlan",
        }
    }
}

impl std::str::FromStr for NetworkBackend {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host-gw" => Ok(Self::HostGw),
            "udp" => Ok(Self::Udp),
            "vxlan" => Ok(Self::Vxlan),
            _ => Err(crate::Error::UnsupportedBackend {
                backend: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for NetworkBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root of the cluster descriptor
///
/// The backend selector is kept as written so that an unsupported value is a
/// validation failure naming the value, not a decode failure.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClusterTopology {
    /// Schema version, defaults to v1
    #[serde(default)]
    pub version: SchemaVersion,

    /// Flannel backend selector
    #[serde(alias = "flannel_backend")]
    pub network_backend: String,

    /// Cluster members in declared order
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,

    /// Public keys authorized for remote administration
    #[serde(default)]
    pub ssh_authorized_keys: Vec<String>,

    /// Free-form template variables
    #[serde(default)]
    pub vars: BTreeMap<String, serde_yaml::Value>,
}

impl ClusterTopology {
    /// Parsed backend selector
    pub fn backend(&self) -> Result<NetworkBackend, crate::Error> {
        self.network_backend.parse()
    }

    /// First node declaring the given address
    pub fn find_node(&self, mac: &MacAddress) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.mac == *mac)
    }

    /// Nodes with the control-plane role, in declared order
    pub fn control_plane_nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.kube_master)
    }

    /// Nodes with the coordination (etcd) role, in declared order
    pub fn coordination_nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.etcd_member)
    }
}

/// One cluster member
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    /// Primary NIC hardware address
    pub mac: MacAddress,

    /// Hostname, derived from the MAC when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Runs the Kubernetes control plane
    #[serde(default)]
    pub kube_master: bool,

    /// Participates in the etcd cluster
    #[serde(default)]
    pub etcd_member: bool,

    /// Hosts the ingress controller
    #[serde(default)]
    pub ingress: bool,

    /// Node-specific template values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, serde_yaml::Value>,
}

impl NodeSpec {
    /// Create a worker node with no roles
    pub fn new(mac: MacAddress) -> Self {
        Self {
            mac,
            hostname: None,
            kube_master: false,
            etcd_member: false,
            ingress: false,
            overrides: BTreeMap::new(),
        }
    }

    /// Effective hostname
    pub fn hostname(&self) -> String {
        self.hostname
            .clone()
            .unwrap_or_else(|| self.mac.to_hostname())
    }

    /// Returns true if the node has neither control-plane nor etcd role
    pub fn is_worker(&self) -> bool {
        !self.kube_master && !self.etcd_member
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod network_backend {
        use super::*;

        #[test]
        fn story_test_from_str_valid() {
            assert_eq!(
                "host-gw".parse::<NetworkBackend>().unwrap(),
                NetworkBackend::HostGw
            );
            assert_eq!("udp".parse::<NetworkBackend>().unwrap(), NetworkBackend::Udp);
            assert_eq!(
                "vxlan".parse::<NetworkBackend>().unwrap(),
                NetworkBackend::Vxlan
            );
        }

        #[test]
        fn story_test_from_str_invalid_names_value() {
            let err = "token-ring".parse::<NetworkBackend>().unwrap_err();
            assert!(matches!(
                err,
                crate::Error::UnsupportedBackend { ref backend } if backend == "token-ring"
            ));
        }

        #[test]
        fn story_test_display_round_trips_supported_list() {
            for s in NetworkBackend::SUPPORTED {
                assert_eq!(s.parse::<NetworkBackend>().unwrap().to_string(), s);
            }
            assert!(!NetworkBackend::is_valid("HOST-GW"));
            assert!(!NetworkBackend::is_valid(""));
        }
    }

    mod node_spec {
        use super::*;

        #[test]
        fn story_hostname_defaults_to_mac() {
            let node = NodeSpec::new(MacAddress::new("00:25:90:c0:f6:ee").unwrap());
            assert_eq!(node.hostname(), "00-25-90-c0-f6-ee");
            assert!(node.is_worker());
        }

        #[test]
        fn story_explicit_hostname_wins() {
            let mut node = NodeSpec::new(MacAddress::ZERO);
            node.hostname = Some("master-0".to_string());
            node.kube_master = true;
            assert_eq!(node.hostname(), "master-0");
            assert!(!node.is_worker());
        }
    }
}
