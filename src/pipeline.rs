//! End-to-end rendering pipeline
//!
//! Topology Model -> Topology Validator -> (per identity) Identity Resolver ->
//! Template Renderer -> Document Validator. [`validate_all`] runs it for the
//! sentinel and every declared node; [`render_request`] runs it for one
//! request.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::RenderConfig;
use crate::document::validate_rendered;
use crate::identity::{IdentityResolver, RenderContext};
use crate::pki::CaMaterial;
use crate::template::{RenderedDocument, TemplateSet};
use crate::topology::{self, ClusterTopology, MacAddress};
use crate::{Error, Result};

/// One identity rendered during validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedIdentity {
    /// Identity rendered
    pub identity: MacAddress,
    /// False for the sentinel
    pub registered: bool,
    /// Size of the rendered document
    pub bytes: usize,
}

/// Outcome of a successful [`validate_all`]
#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    /// Identities in render order: sentinel first, then nodes as declared
    pub rendered: Vec<RenderedIdentity>,
}

impl ValidationReport {
    /// Number of documents rendered
    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    /// True if nothing was rendered
    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }
}

/// Parse and validate a descriptor
pub fn load_topology(raw: &[u8]) -> Result<ClusterTopology> {
    let topology = topology::parse_topology(raw)?;
    topology::validate(&topology)?;
    Ok(topology)
}

/// Render one context and check the output parses
pub fn render_for(
    ctx: &RenderContext,
    templates: &TemplateSet,
    ca: &CaMaterial,
) -> Result<RenderedDocument> {
    let doc = templates.render(ctx, ca)?;
    validate_rendered(doc.as_bytes()).map_err(|e| Error::OutputFormat {
        identity: ctx.identity.to_string(),
        message: e.to_string(),
    })?;
    Ok(doc)
}

/// Render the document for one requested identity from raw descriptor bytes
///
/// Templates and CA material are loaded on every call, so edits on disk take
/// effect on the next request.
pub fn render_request(config: &RenderConfig, raw: &[u8], requested: &str) -> Result<RenderedDocument> {
    let topology = Arc::new(load_topology(raw)?);
    let templates = TemplateSet::load(&config.template_dir, config.root_template.clone())?;
    let ca = CaMaterial::from_paths(&config.ca)?;

    let ctx = IdentityResolver::new(config.sentinel).resolve(topology, requested);
    render_for(&ctx, &templates, &ca)
}

/// Render and validate the sentinel and every declared node
///
/// Stops at the first failure; render and document errors carry the
/// identity being processed.
#[instrument(skip_all, fields(cluster_desc = %config.cluster_desc.display()))]
pub fn validate_all(config: &RenderConfig) -> Result<ValidationReport> {
    let raw = std::fs::read(&config.cluster_desc).map_err(|e| Error::io(&config.cluster_desc, e))?;
    let topology = Arc::new(load_topology(&raw)?);
    let templates = TemplateSet::load(&config.template_dir, config.root_template.clone())?;
    let ca = CaMaterial::from_paths(&config.ca)?;
    let resolver = IdentityResolver::new(config.sentinel);
    debug!(
        templates = %templates.location().display(),
        root = templates.root(),
        sentinel = %resolver.sentinel(),
        nodes = topology.nodes.len(),
        "validating cluster"
    );

    let contexts = std::iter::once(resolver.sentinel_context(Arc::clone(&topology))).chain(
        topology
            .nodes
            .iter()
            .map(|node| resolver.resolve(Arc::clone(&topology), &node.mac.to_string())),
    );

    let mut report = ValidationReport::default();
    for ctx in contexts {
        let doc = render_for(&ctx, &templates, &ca)?;
        debug!(identity = %ctx.identity, bytes = doc.as_bytes().len(), "document valid");
        report.rendered.push(RenderedIdentity {
            identity: ctx.identity,
            registered: ctx.is_registered(),
            bytes: doc.as_bytes().len(),
        });
    }

    info!(documents = report.len(), "all cloud-configs rendered and validated");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::CaPaths;
    use tempfile::TempDir;

    const DESCRIPTOR: &str = r#"
network_backend: vxlan
nodes:
  - mac: "aa:00:00:00:00:01"
    kube_master: true
    etcd_member: true
  - mac: "aa:00:00:00:00:02"
ssh_authorized_keys: [ssh-rsa AAAA admin]
"#;

    struct Fixture {
        _dir: TempDir,
        config: RenderConfig,
    }

    fn fixture(descriptor: &str, template: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        std::fs::create_dir(&templates).unwrap();
        std::fs::write(templates.join("cc-template"), template).unwrap();

        let desc = dir.path().join("cluster-desc.yml");
        std::fs::write(&desc, descriptor).unwrap();

        let ca = CaPaths::in_dir(dir.path());
        std::fs::write(&ca.key, "KEY").unwrap();
        std::fs::write(&ca.cert, "CERT").unwrap();

        let mut config = RenderConfig::with_ca(ca);
        config.cluster_desc = desc;
        config.template_dir = templates;
        Fixture { _dir: dir, config }
    }

    #[test]
    fn story_sentinel_then_nodes_in_declared_order() {
        let f = fixture(DESCRIPTOR, "hostname: {{ node.hostname }}\n");
        let report = validate_all(&f.config).unwrap();

        let order: Vec<String> = report
            .rendered
            .iter()
            .map(|r| r.identity.to_string())
            .collect();
        assert_eq!(
            order,
            ["00:00:00:00:00:00", "aa:00:00:00:00:01", "aa:00:00:00:00:02"]
        );
        assert!(!report.rendered[0].registered);
        assert!(report.rendered[1].registered);
    }

    #[test]
    fn story_invalid_output_names_the_identity() {
        let f = fixture(
            DESCRIPTOR,
            "{% if node.etcd_member %}a: b: c{% else %}a: 1{% endif %}\n",
        );
        let err = validate_all(&f.config).unwrap_err();
        assert!(matches!(err, Error::OutputFormat { .. }));
        assert_eq!(err.identity(), Some("aa:00:00:00:00:01"));
    }

    #[test]
    fn story_policy_failure_stops_before_rendering() {
        let f = fixture(
            "network_backend: vxlan\nnodes: []\nssh_authorized_keys: [k]\n",
            "{{ undefined_everywhere }}\n",
        );
        let err = validate_all(&f.config).unwrap_err();
        assert!(matches!(err, Error::TopologyIncomplete { .. }));
    }

    #[test]
    fn story_missing_descriptor_is_an_io_error() {
        let mut f = fixture(DESCRIPTOR, "a: 1\n");
        f.config.cluster_desc = f.config.cluster_desc.with_file_name("absent.yml");
        let err = validate_all(&f.config).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().contains("absent.yml"));
    }

    #[test]
    fn story_missing_ca_is_reported() {
        let f = fixture(DESCRIPTOR, "a: 1\n");
        std::fs::remove_file(&f.config.ca.key).unwrap();
        assert!(matches!(
            validate_all(&f.config),
            Err(Error::CaMaterial { .. })
        ));
    }

    #[test]
    fn story_request_for_unknown_mac_gets_default_document() {
        let f = fixture(DESCRIPTOR, "registered: {{ registered }}\nmac: \"{{ mac }}\"\n");
        let doc = render_request(&f.config, DESCRIPTOR.as_bytes(), "de:ad:be:ef:00:00").unwrap();
        assert_eq!(doc.as_str(), "registered: false\nmac: \"00:00:00:00:00:00\"\n");

        let doc = render_request(&f.config, DESCRIPTOR.as_bytes(), "AA:00:00:00:00:02").unwrap();
        assert_eq!(doc.as_str(), "registered: true\nmac: \"aa:00:00:00:00:02\"\n");
    }

    #[test]
    fn story_request_with_bad_descriptor_fails() {
        let f = fixture(DESCRIPTOR, "a: 1\n");
        assert!(matches!(
            render_request(&f.config, b"network_backend: [", "aa:00:00:00:00:01"),
            Err(Error::Format { .. })
        ));
    }

    #[test]
    fn story_shared_template_set_renders_from_many_threads() {
        let f = fixture(DESCRIPTOR, "hostname: {{ node.hostname }}\n");
        let topology = Arc::new(load_topology(DESCRIPTOR.as_bytes()).unwrap());
        let templates = TemplateSet::load(&f.config.template_dir, "cc-template").unwrap();
        let ca = CaMaterial::from_paths(&f.config.ca).unwrap();
        let resolver = IdentityResolver::default();

        let outputs: Vec<(String, String)> = std::thread::scope(|scope| {
            let handles: Vec<_> = ["aa:00:00:00:00:01", "aa:00:00:00:00:02", "ff:00:00:00:00:09"]
                .into_iter()
                .cycle()
                .take(12)
                .map(|mac| {
                    let ctx = resolver.resolve(Arc::clone(&topology), mac);
                    let (templates, ca) = (&templates, &ca);
                    scope.spawn(move || {
                        let doc = render_for(&ctx, templates, ca).unwrap();
                        (mac.to_string(), doc.into_string())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outputs.len(), 12);
        for (mac, doc) in outputs {
            let expected = match mac.as_str() {
                "ff:00:00:00:00:09" => "hostname: 00-00-00-00-00-00\n".to_string(),
                other => format!("hostname: {}\n", other.replace(':', "-")),
            };
            assert_eq!(doc, expected);
        }
        assert_eq!(Arc::strong_count(&topology), 1);
    }
}
