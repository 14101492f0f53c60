//! Resolved runtime configuration
//!
//! The CLI turns flags and environment variables into these values once at
//! startup; everything downstream takes them by reference.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::pki::CaPaths;
use crate::topology::MacAddress;

/// Default descriptor path
pub const DEFAULT_CLUSTER_DESC: &str = "./cluster-desc.yml";

/// Default template directory
pub const DEFAULT_TEMPLATE_DIR: &str = "./cloud-config.template";

/// Default static file directory
pub const DEFAULT_STATIC_DIR: &str = "./static/";

/// Inputs shared by the validate and serve commands
#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// Cluster descriptor file
    pub cluster_desc: PathBuf,
    /// Template set directory
    pub template_dir: PathBuf,
    /// Root template name within `template_dir`
    pub root_template: String,
    /// CA key and certificate locations
    pub ca: CaPaths,
    /// Identity rendered for unregistered nodes
    pub sentinel: MacAddress,
}

impl RenderConfig {
    /// Config with default locations and the given CA paths
    pub fn with_ca(ca: CaPaths) -> Self {
        Self {
            cluster_desc: PathBuf::from(DEFAULT_CLUSTER_DESC),
            template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            root_template: crate::DEFAULT_ROOT_TEMPLATE.to_string(),
            ca,
            sentinel: crate::DEFAULT_SENTINEL_MAC,
        }
    }
}

/// Serve command configuration
#[derive(Clone, Debug)]
pub struct ServeConfig {
    /// Rendering inputs
    pub render: RenderConfig,
    /// Listen address
    pub addr: SocketAddr,
    /// Directory served under `/static/`
    pub static_dir: PathBuf,
    /// Remote descriptor mirrored into `render.cluster_desc`
    pub cluster_desc_url: Option<String>,
}

/// Parse a listen address, accepting the `:port` shorthand for all interfaces
pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr, String> {
    let full = match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => addr.to_string(),
    };
    full.parse()
        .map_err(|e| format!("invalid listen address '{}': {}", addr, e))
}
