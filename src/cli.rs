//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::{self, RenderConfig, ServeConfig};
use crate::pki::{ensure_root_ca, CaPaths, CertificateInfo};
use crate::topology::MacAddress;
use crate::{pipeline, server, Result};

/// Cloud-config server - renders per-node cloud-config from a cluster descriptor
#[derive(Parser, Debug)]
#[command(name = "cloud-config-server")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "CLOUD_CONFIG_LOG_JSON")]
    pub log_json: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve cloud-configs over HTTP
    Serve(ServeArgs),

    /// Render every node once, validate the output and exit
    ///
    /// Exits non-zero with the first diagnostic if the descriptor, a
    /// template or a rendered document is invalid.
    Validate(RenderArgs),
}

/// Arguments shared by both commands
#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Cluster descriptor file
    #[arg(long, env = "CLOUD_CONFIG_CLUSTER_DESC", default_value = config::DEFAULT_CLUSTER_DESC)]
    pub cluster_desc: PathBuf,

    /// Directory containing the cloud-config templates
    #[arg(long, env = "CLOUD_CONFIG_TEMPLATE_DIR", default_value = config::DEFAULT_TEMPLATE_DIR)]
    pub template_dir: PathBuf,

    /// Name of the root template inside the template directory
    #[arg(long, env = "CLOUD_CONFIG_ROOT_TEMPLATE", default_value = crate::DEFAULT_ROOT_TEMPLATE)]
    pub root_template: String,

    /// CA certificate; generated into --ca-dir when not given together with --ca-key
    #[arg(long, env = "CLOUD_CONFIG_CA_CRT")]
    pub ca_crt: Option<PathBuf>,

    /// CA private key
    #[arg(long, env = "CLOUD_CONFIG_CA_KEY")]
    pub ca_key: Option<PathBuf>,

    /// Directory for a generated CA
    #[arg(long, env = "CLOUD_CONFIG_CA_DIR", default_value = "./")]
    pub ca_dir: PathBuf,

    /// Identity rendered for unregistered nodes
    #[arg(long, env = "CLOUD_CONFIG_SENTINEL_MAC", default_value = "00:00:00:00:00:00")]
    pub sentinel_mac: MacAddress,
}

/// Serve command arguments
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Rendering inputs
    #[command(flatten)]
    pub render: RenderArgs,

    /// Listen address (`:8080` listens on all interfaces)
    #[arg(long, env = "CLOUD_CONFIG_ADDR", default_value = crate::DEFAULT_LISTEN_ADDR, value_parser = config::parse_listen_addr)]
    pub addr: std::net::SocketAddr,

    /// Directory served under /static/
    #[arg(long, env = "CLOUD_CONFIG_STATIC_DIR", default_value = config::DEFAULT_STATIC_DIR)]
    pub static_dir: PathBuf,

    /// Fetch the descriptor from this URL, mirroring it to --cluster-desc
    #[arg(long, env = "CLOUD_CONFIG_CLUSTER_DESC_URL")]
    pub cluster_desc_url: Option<String>,
}

impl RenderArgs {
    /// Resolve CA paths, generating a root CA if none was supplied
    pub fn resolve(&self) -> Result<RenderConfig> {
        let ca = match (&self.ca_crt, &self.ca_key) {
            (Some(cert), Some(key)) => {
                let paths = CaPaths {
                    key: key.clone(),
                    cert: cert.clone(),
                };
                paths.check_exist()?;
                paths
            }
            _ => ensure_root_ca(&self.ca_dir)?,
        };

        if let Ok(pem) = std::fs::read_to_string(&ca.cert) {
            if let Ok(cert) = CertificateInfo::from_pem(&pem) {
                info!(
                    subject = %cert.common_name,
                    not_after = cert.not_after,
                    expired = cert.is_expired(),
                    "root CA"
                );
            }
        }

        Ok(RenderConfig {
            cluster_desc: self.cluster_desc.clone(),
            template_dir: self.template_dir.clone(),
            root_template: self.root_template.clone(),
            ca,
            sentinel: self.sentinel_mac,
        })
    }
}

impl ServeArgs {
    /// Resolve into a serve configuration
    pub fn resolve(&self) -> Result<ServeConfig> {
        Ok(ServeConfig {
            render: self.render.resolve()?,
            addr: self.addr,
            static_dir: self.static_dir.clone(),
            cluster_desc_url: self.cluster_desc_url.clone(),
        })
    }
}

impl Cli {
    /// Run the selected command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Serve(args) => server::serve(args.resolve()?).await,
            Commands::Validate(args) => {
                let config = args.resolve()?;
                let report = pipeline::validate_all(&config)?;
                for doc in &report.rendered {
                    info!(
                        identity = %doc.identity,
                        registered = doc.registered,
                        bytes = doc.bytes,
                        "ok"
                    );
                }
                Ok(())
            }
        }
    }
}
