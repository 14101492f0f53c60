//! Cloud-config templating
//!
//! Templates are minijinja files in one directory; the root template (by
//! default `cc-template`) may include the others. See `context` for the
//! values available to a template and `filters` for the custom filters.
//!
//! ```jinja
//! #cloud-config
//! hostname: {{ node.hostname | yaml_quote }}
//! ssh_authorized_keys:
//! {% for key in ssh_authorized_keys %}  - {{ key | yaml_quote }}
//! {% endfor %}
//! {% if node.etcd_member %}{% include "etcd.yaml" %}{% endif %}
//! ```

mod context;
mod engine;
mod filters;

pub use engine::{render, RenderedDocument, TemplateSet};

/// Root template name used when none is configured
pub const DEFAULT_ROOT_TEMPLATE: &str = "cc-template";
