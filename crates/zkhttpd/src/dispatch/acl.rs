//! Conversion between ACL entries and their JSON representation.

use serde_json::{Map, Value, json};

use crate::coordination::AclEntry;

use super::errors::DispatchError;
use super::request::integral_i32;

/// Permission mask granting every operation.
pub const PERM_ALL: i32 = 0x1f;

/// Returns the ACL applied when a request supplies none.
#[must_use]
pub fn default_acl() -> Vec<AclEntry> {
    vec![AclEntry::new("world", "anyone", PERM_ALL)]
}

/// Encodes ACL entries as `{id, perms, scheme}` objects.
#[must_use]
pub fn acl_to_json(acl: &[AclEntry]) -> Vec<Value> {
    acl.iter()
        .map(|entry| {
            json!({
                "id": entry.id,
                "perms": entry.perms,
                "scheme": entry.scheme,
            })
        })
        .collect()
}

/// Decodes a JSON array of ACL objects.
///
/// # Errors
///
/// Returns `InvalidArguments` when the value is not an array of objects with
/// string `scheme` and `id` and a non-negative 32-bit integer `perms`.
pub fn acl_from_json(value: &Value) -> Result<Vec<AclEntry>, DispatchError> {
    let Value::Array(entries) = value else {
        return Err(DispatchError::invalid_arguments("acl must be an array"));
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(fields) => acl_entry(index, fields),
            _ => Err(DispatchError::invalid_arguments(format!(
                "acl[{index}] must be an object"
            ))),
        })
        .collect()
}

fn acl_entry(index: usize, fields: &Map<String, Value>) -> Result<AclEntry, DispatchError> {
    let text = |key: &str| match fields.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        _ => Err(DispatchError::invalid_arguments(format!(
            "acl[{index}].{key} must be a string"
        ))),
    };
    let perms = fields
        .get("perms")
        .and_then(integral_i32)
        .filter(|perms| *perms >= 0)
        .ok_or_else(|| {
            DispatchError::invalid_arguments(format!(
                "acl[{index}].perms must be a non-negative 32-bit integer"
            ))
        })?;

    Ok(AclEntry {
        scheme: text("scheme")?,
        id: text("id")?,
        perms,
    })
}
