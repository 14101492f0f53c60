//! Error types for cloud-config generation
//!
//! Every variant is fatal to the operation that produced it. Nothing here is
//! transient, so callers never retry; the server converts errors into responses
//! and the validate command into a non-zero exit.

use std::path::PathBuf;

use thiserror::Error;

use crate::pki::PkiError;

/// Main error type for topology parsing, validation and rendering
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Descriptor could not be decoded into the topology schema
    #[error("cluster descriptor format error: {message}")]
    Format {
        /// Decoder message, including line/column when available
        message: String,
    },

    /// Network backend selector is not one of the supported values
    #[error("unsupported network backend '{backend}', expected one of: host-gw, udp, vxlan")]
    UnsupportedBackend {
        /// The offending selector as written in the descriptor
        backend: String,
    },

    /// Cluster cannot reach quorum or has no control plane
    #[error(
        "cluster must have at least one control-plane node and one coordination node \
         (found {control_plane} control-plane, {coordination} coordination)"
    )]
    TopologyIncomplete {
        /// Number of nodes with the control-plane role
        control_plane: usize,
        /// Number of nodes with the coordination (etcd) role
        coordination: usize,
    },

    /// No trusted public key, so nodes would be unreachable for administration
    #[error("cluster must declare at least one trusted ssh public key")]
    MissingTrustMaterial,

    /// Two nodes declare the same hardware address
    #[error("hardware address {mac} is declared by more than one node")]
    DuplicateIdentity {
        /// The duplicated address in canonical form
        mac: String,
    },

    /// Template set or root template could not be loaded
    #[error("failed to load template '{template}' from {}: {message}", .location.display())]
    TemplateLoad {
        /// Name of the template that was requested
        template: String,
        /// Template set directory
        location: PathBuf,
        /// What went wrong
        message: String,
    },

    /// Template evaluation failed for an identity
    #[error("failed to render cloud-config for {identity}: {source}")]
    Render {
        /// Identity being rendered
        identity: String,
        /// Underlying template engine error
        #[source]
        source: minijinja::Error,
    },

    /// Rendered output is not a well-formed document
    #[error("rendered cloud-config for {identity} is not valid YAML: {message}")]
    OutputFormat {
        /// Identity being rendered
        identity: String,
        /// Decoder message
        message: String,
    },

    /// CA key or certificate could not be read
    #[error("failed to read CA material {}: {source}", .path.display())]
    CaMaterial {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Generic file I/O error with path context
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Descriptor source could not produce any content
    #[error("descriptor cache error for {url}: {message}")]
    Cache {
        /// Remote resource location
        url: String,
        /// What went wrong
        message: String,
    },

    /// HTTP listener could not be started or failed while serving
    #[error("failed to serve on {addr}: {source}")]
    Listen {
        /// Listen address
        addr: std::net::SocketAddr,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Certificate authority bootstrap failed
    #[error(transparent)]
    Pki(#[from] PkiError),
}

impl Error {
    /// Create a format error with the given message
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format {
            message: msg.into(),
        }
    }

    /// Create an I/O error for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a template load error
    pub fn template_load(
        template: impl Into<String>,
        location: impl Into<PathBuf>,
        msg: impl Into<String>,
    ) -> Self {
        Self::TemplateLoad {
            template: template.into(),
            location: location.into(),
            message: msg.into(),
        }
    }

    /// Returns true if this error comes from the topology validator
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedBackend { .. }
                | Self::TopologyIncomplete { .. }
                | Self::MissingTrustMaterial
                | Self::DuplicateIdentity { .. }
        )
    }

    /// Identity the error is attributed to, if any
    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::Render { identity, .. } | Self::OutputFormat { identity, .. } => Some(identity),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::format(err.to_string())
    }
}
