//! Values exposed to cloud-config templates
//!
//! - `cluster` - `version`, `network_backend`, `nodes` (each with derived
//!   hostname and an `overrides` map), `ssh_authorized_keys`, `vars`
//! - `node` - the resolved node (`mac`, `hostname`, role flags, `overrides`)
//! - `mac` - identity being rendered
//! - `registered` - false on the sentinel path
//! - `vars` - cluster `vars` with the node's `overrides` layered on top
//! - `etcd_nodes`, `master_nodes` - role members in declared order
//! - `ssh_authorized_keys`, `network_backend`
//! - `ca_crt`, `ca_key` - CA PEM text

use std::collections::BTreeMap;

use minijinja::Value;
use serde::Serialize;

use crate::identity::RenderContext;
use crate::pki::CaMaterial;
use crate::topology::{ClusterTopology, MacAddress, NodeSpec, SchemaVersion};

#[derive(Debug, Serialize)]
struct NodeValues {
    mac: String,
    hostname: String,
    kube_master: bool,
    etcd_member: bool,
    ingress: bool,
    overrides: BTreeMap<String, serde_yaml::Value>,
}

impl NodeValues {
    fn from_node(node: &NodeSpec) -> Self {
        Self {
            mac: node.mac.to_string(),
            hostname: node.hostname(),
            kube_master: node.kube_master,
            etcd_member: node.etcd_member,
            ingress: node.ingress,
            overrides: node.overrides.clone(),
        }
    }

    fn sentinel(mac: MacAddress) -> Self {
        Self {
            mac: mac.to_string(),
            hostname: mac.to_hostname(),
            kube_master: false,
            etcd_member: false,
            ingress: false,
            overrides: BTreeMap::new(),
        }
    }
}

/// Topology as templates see it: every node fully populated
#[derive(Debug, Serialize)]
struct ClusterValues<'a> {
    version: SchemaVersion,
    network_backend: &'a str,
    nodes: Vec<NodeValues>,
    ssh_authorized_keys: &'a [String],
    vars: &'a BTreeMap<String, serde_yaml::Value>,
}

impl<'a> ClusterValues<'a> {
    fn from_topology(topology: &'a ClusterTopology) -> Self {
        Self {
            version: topology.version,
            network_backend: &topology.network_backend,
            nodes: topology.nodes.iter().map(NodeValues::from_node).collect(),
            ssh_authorized_keys: &topology.ssh_authorized_keys,
            vars: &topology.vars,
        }
    }
}

#[derive(Debug, Serialize)]
struct TemplateValues<'a> {
    cluster: ClusterValues<'a>,
    node: NodeValues,
    mac: String,
    registered: bool,
    vars: BTreeMap<String, serde_yaml::Value>,
    etcd_nodes: Vec<NodeValues>,
    master_nodes: Vec<NodeValues>,
    ssh_authorized_keys: &'a [String],
    network_backend: &'a str,
    ca_crt: &'a str,
    ca_key: &'a str,
}

/// Build the template root value for one render
pub(crate) fn template_value(ctx: &RenderContext, ca: &CaMaterial) -> Value {
    let topology = ctx.topology.as_ref();

    let node = match &ctx.node {
        Some(n) => NodeValues::from_node(n),
        None => NodeValues::sentinel(ctx.identity),
    };

    let mut vars = topology.vars.clone();
    vars.extend(
        node.overrides
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    let values = TemplateValues {
        cluster: ClusterValues::from_topology(topology),
        mac: ctx.identity.to_string(),
        registered: ctx.is_registered(),
        vars,
        etcd_nodes: topology
            .coordination_nodes()
            .map(NodeValues::from_node)
            .collect(),
        master_nodes: topology
            .control_plane_nodes()
            .map(NodeValues::from_node)
            .collect(),
        ssh_authorized_keys: &topology.ssh_authorized_keys,
        network_backend: &topology.network_backend,
        ca_crt: ca.cert_pem(),
        ca_key: ca.key_pem(),
        node,
    };

    Value::from_serialize(&values)
}
