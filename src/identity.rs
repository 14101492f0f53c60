//! Node identity resolution
//!
//! Maps a requested hardware address to its topology entry. Unregistered or
//! unparsable identities resolve to the configured sentinel address, which
//! selects the default rendering. Resolution never fails.

use std::sync::Arc;

use tracing::debug;

use crate::topology::{ClusterTopology, MacAddress, NodeSpec};

/// Per-request view of one node within a topology
#[derive(Clone, Debug)]
pub struct RenderContext {
    /// Identity being rendered: the node's address, or the sentinel
    pub identity: MacAddress,
    /// Identity as it was requested, for diagnostics only
    pub requested: String,
    /// Resolved node, `None` on the sentinel path
    pub node: Option<NodeSpec>,
    /// Owning topology
    pub topology: Arc<ClusterTopology>,
}

impl RenderContext {
    /// Returns true if the identity matched a declared node
    pub fn is_registered(&self) -> bool {
        self.node.is_some()
    }
}

/// Resolves requested identities against a topology
#[derive(Clone, Copy, Debug)]
pub struct IdentityResolver {
    sentinel: MacAddress,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SENTINEL_MAC)
    }
}

impl IdentityResolver {
    /// Create a resolver falling back to the given sentinel
    pub fn new(sentinel: MacAddress) -> Self {
        Self { sentinel }
    }

    /// Sentinel identity used for unregistered nodes
    pub fn sentinel(&self) -> MacAddress {
        self.sentinel
    }

    /// Resolve a requested identity
    ///
    /// Matching is case-insensitive and accepts `:` or `-` separators. When
    /// several nodes share an address the first declared wins; validation
    /// rejects such topologies before they get here.
    pub fn resolve(&self, topology: Arc<ClusterTopology>, requested: &str) -> RenderContext {
        let node = MacAddress::new(requested)
            .ok()
            .and_then(|mac| topology.find_node(&mac).cloned());

        let identity = match &node {
            Some(n) => n.mac,
            None => {
                debug!(requested, sentinel = %self.sentinel, "unregistered identity, using sentinel");
                self.sentinel
            }
        };

        RenderContext {
            identity,
            requested: requested.to_string(),
            node,
            topology,
        }
    }

    /// Context for the sentinel identity
    pub fn sentinel_context(&self, topology: Arc<ClusterTopology>) -> RenderContext {
        RenderContext {
            identity: self.sentinel,
            requested: self.sentinel.to_string(),
            node: None,
            topology,
        }
    }
}
