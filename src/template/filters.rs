//! Custom filters for cloud-config templates
//!
//! `base64_encode`/`base64_decode` move text in and out of `b64` file
//! entries, `required` turns a missing value into a render error and
//! `yaml_quote` makes any value safe as a YAML scalar.

use base64::{engine::general_purpose::STANDARD, Engine};
use minijinja::{Error, ErrorKind, Value};

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

/// `{{ ca_crt | base64_encode }}` for `write_files` entries with `encoding: b64`
pub fn base64_encode(value: &str) -> String {
    STANDARD.encode(value)
}

/// Inverse of `base64_encode`; the decoded bytes must be UTF-8 text
pub fn base64_decode(value: &str) -> Result<String, Error> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|e| invalid(format!("`{value}` is not base64: {e}")))?;
    String::from_utf8(bytes).map_err(|_| invalid("decoded base64 is not UTF-8 text"))
}

/// Required filter - fails if value is undefined or none
///
/// Usage: `{{ vars.kube_version | required }}`
pub fn required(value: Value) -> Result<Value, Error> {
    if value.is_undefined() || value.is_none() {
        Err(Error::new(
            ErrorKind::UndefinedError,
            "required value is undefined",
        ))
    } else {
        Ok(value)
    }
}

/// Quote a value as a YAML double-quoted scalar
///
/// JSON string syntax is a subset of YAML's double-quoted style, so
/// the JSON encoding of the string form is always a valid scalar.
///
/// Usage: `hostname: {{ node.hostname | yaml_quote }}`
pub fn yaml_quote(value: Value) -> Result<String, Error> {
    let text = match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    };
    serde_json::to_string(&text).map_err(|e| invalid(format!("failed to quote value: {e}")))
}
