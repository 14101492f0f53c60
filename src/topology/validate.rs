//! Cluster policy checks
//!
//! Runs before any rendering. A descriptor that fails here would produce
//! configuration for a cluster that cannot reach quorum or cannot be
//! administered, so no node gets a document.

use std::collections::HashSet;

use tracing::debug;

use super::types::ClusterTopology;
use crate::{Error, Result};

/// Validate a parsed topology
///
/// Checks, in order, stopping at the first failure:
/// 1. the network backend is supported
/// 2. at least one control-plane and one coordination node exist
/// 3. at least one trusted public key is declared
/// 4. no two nodes share a hardware address
pub fn validate(topology: &ClusterTopology) -> Result<()> {
    topology.backend()?;

    let control_plane = topology.control_plane_nodes().count();
    let coordination = topology.coordination_nodes().count();
    debug!(
        nodes = topology.nodes.len(),
        control_plane, coordination, "checking cluster roles"
    );
    if control_plane == 0 || coordination == 0 {
        return Err(Error::TopologyIncomplete {
            control_plane,
            coordination,
        });
    }

    if topology.ssh_authorized_keys.is_empty() {
        return Err(Error::MissingTrustMaterial);
    }

    let mut seen = HashSet::with_capacity(topology.nodes.len());
    for node in &topology.nodes {
        if !seen.insert(node.mac) {
            return Err(Error::DuplicateIdentity {
                mac: node.mac.to_string(),
            });
        }
    }

    Ok(())
}
