//! Template set loading and evaluation
//!
//! Uses minijinja with a path loader rooted at the template directory:
//! - Root template selected by name (default `cc-template`)
//! - `{% include "etcd.yaml" %}` resolves relative to the directory
//! - Printing an undefined value fails; `{% if %}` on one is false
//! - Trailing newline preserved

use std::path::{Path, PathBuf};

use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use tracing::{debug, instrument};

use super::context::template_value;
use super::filters;
use crate::identity::RenderContext;
use crate::pki::CaMaterial;
use crate::{Error, Result};

/// Text produced by one render
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDocument(String);

impl RenderedDocument {
    /// Rendered text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rendered bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Take ownership of the rendered text
    pub fn into_string(self) -> String {
        self.0
    }
}

/// A directory of templates with a named root
///
/// Immutable once loaded and safe to share between concurrent renders.
pub struct TemplateSet {
    env: Environment<'static>,
    location: PathBuf,
    root: String,
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSet")
            .field("location", &self.location)
            .field("root", &self.root)
            .finish()
    }
}

impl TemplateSet {
    /// Load a template set from a directory
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateLoad`] if the directory is not accessible or
    /// the root template does not exist in it. Syntax defects are reported
    /// at render time as [`Error::Render`].
    pub fn load(location: impl AsRef<Path>, root: impl Into<String>) -> Result<Self> {
        let location = location.as_ref().to_path_buf();
        let root = root.into();

        let metadata = std::fs::metadata(&location)
            .map_err(|e| Error::template_load(&root, &location, e.to_string()))?;
        if !metadata.is_dir() {
            return Err(Error::template_load(
                &root,
                &location,
                "template location is not a directory",
            ));
        }

        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(&location));
        env.set_undefined_behavior(UndefinedBehavior::SemiStrict);
        env.set_keep_trailing_newline(true);

        env.add_filter("base64_encode", filters::base64_encode);
        env.add_filter("base64_decode", filters::base64_decode);
        env.add_filter("required", filters::required);
        env.add_filter("yaml_quote", filters::yaml_quote);

        let set = Self {
            env,
            location,
            root,
        };

        if let Err(e) = set.env.get_template(&set.root) {
            if e.kind() == ErrorKind::TemplateNotFound {
                return Err(Error::template_load(
                    &set.root,
                    &set.location,
                    "template not found",
                ));
            }
        }

        debug!(location = %set.location.display(), root = %set.root, "loaded template set");
        Ok(set)
    }

    /// Template set directory
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Root template name
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Render the root template for one identity
    ///
    /// Deterministic: the same context, templates and CA material always
    /// produce the same bytes.
    ///
    /// # Errors
    ///
    /// [`Error::Render`] carrying the identity for syntax errors, undefined
    /// values, filter failures and includes missing from the directory.
    #[instrument(skip_all, fields(identity = %ctx.identity))]
    pub fn render(&self, ctx: &RenderContext, ca: &CaMaterial) -> Result<RenderedDocument> {
        let classify = |e: minijinja::Error| Error::Render {
            identity: ctx.identity.to_string(),
            source: e,
        };

        let template = self.env.get_template(&self.root).map_err(classify)?;
        let text = template
            .render(template_value(ctx, ca))
            .map_err(classify)?;

        debug!(bytes = text.len(), "rendered cloud-config");
        Ok(RenderedDocument(text))
    }
}

/// Load templates and CA material from paths and render one context
///
/// One-shot form for callers that do not keep a [`TemplateSet`] around.
pub fn render(
    ctx: &RenderContext,
    location: impl AsRef<Path>,
    root: &str,
    ca_key_path: impl AsRef<Path>,
    ca_cert_path: impl AsRef<Path>,
) -> Result<RenderedDocument> {
    let templates = TemplateSet::load(location, root)?;
    let ca = CaMaterial::load(ca_key_path, ca_cert_path)?;
    templates.render(ctx, &ca)
}
