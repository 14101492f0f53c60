//! Cloud-config server - per-node boot configuration for bare-metal clusters
//!
//! Nodes PXE-boot, ask for their cloud-config by MAC address, and come up as
//! etcd members, control-plane nodes or workers depending on what the cluster
//! descriptor says about them.
//!
//! # Pipeline
//!
//! A cluster descriptor is parsed into a [`topology::ClusterTopology`] and
//! checked against cluster policy. For each requested identity the
//! [`identity::IdentityResolver`] finds the node (or falls back to a sentinel),
//! the [`template`] module renders the root template with the node and CA
//! material, and [`document`] checks the output is well-formed YAML before it
//! leaves the process.
//!
//! # Modules
//!
//! - [`topology`] - Descriptor schema, parsing and policy validation
//! - [`identity`] - MAC address resolution
//! - [`template`] - minijinja template sets and rendering
//! - [`document`] - Rendered output validation
//! - [`pipeline`] - End-to-end rendering and `validate` mode
//! - [`server`] - HTTP dispatcher
//! - [`cache`] - Local and remote descriptor sources
//! - [`pki`] - Root CA bootstrap
//! - [`config`] - Resolved runtime configuration
//! - [`cli`] - Command-line interface
//! - [`telemetry`] - Logging setup
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod pki;
pub mod server;
pub mod telemetry;
pub mod template;
pub mod topology;

pub use error::Error;
pub use template::DEFAULT_ROOT_TEMPLATE;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Identity rendered for nodes missing from the descriptor
///
/// The all-zero address never belongs to real hardware.
pub const DEFAULT_SENTINEL_MAC: topology::MacAddress = topology::MacAddress::ZERO;

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = ":8080";
