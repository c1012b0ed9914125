//! Reusable extra field validators.

use serde_json::Value;
use uuid::Uuid;

/// Validate a GUID field: any RFC 4122 textual form is accepted and kept
/// as a string.
///
/// Attach with [`FieldSpec::with_validator`](crate::FieldSpec::with_validator):
///
/// ```rust
/// use opensearch_odm::{validators, FieldSpec};
///
/// let spec = FieldSpec::keyword().with_validator(validators::guid);
/// ```
pub fn guid(value: &Value) -> Result<Value, String> {
    let Some(text) = value.as_str() else {
        return Err(format!("invalid GUID field {value}"));
    };
    match Uuid::parse_str(text) {
        Ok(_) => Ok(Value::String(text.to_string())),
        Err(e) => Err(format!("invalid GUID field {text}: {e}")),
    }
}
