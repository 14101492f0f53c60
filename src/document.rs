//! Rendered document validation
//!
//! Re-parses rendered output with the same YAML decoder used for cluster
//! descriptors. Catches template defects that produce broken YAML (unescaped
//! values, bad indentation) before a booting node sees them.

use serde_yaml::Value;
use thiserror::Error;

/// Rendered output is not a well-formed cloud-config document
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct DocumentError(String);

/// Validate rendered bytes
///
/// Accepts a single YAML document whose root is a mapping, or an empty
/// document. Scalars, sequences, multiple documents and syntax errors are
/// rejected.
pub fn validate_rendered(bytes: &[u8]) -> Result<(), DocumentError> {
    let value: Value =
        serde_yaml::from_slice(bytes).map_err(|e| DocumentError(e.to_string()))?;

    match value {
        Value::Mapping(_) | Value::Null => Ok(()),
        Value::Tagged(_) => Err(DocumentError(
            "document root must be a mapping, found a tagged value".to_string(),
        )),
        Value::Sequence(_) => Err(DocumentError(
            "document root must be a mapping, found a sequence".to_string(),
        )),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => Err(DocumentError(
            "document root must be a mapping, found a scalar".to_string(),
        )),
    }
}
