//! Field-level three-way merge of entity records.
//!
//! The merge starts from the server record and only keeps local values that
//! provably diverged from the common base:
//! - nested objects are merged recursively
//! - arrays keep the local value when it differs from the base array
//! - scalars keep the local value only when it differs from both base and
//!   server
//!
//! Merging works on `serde_json::Value`, so any serializable record can be
//! merged without per-type code.

use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// Fields that change on every edit and never count as conflicts
const BOOKKEEPING_FIELDS: &[&str] = &["version", "lastModifiedAt"];

/// Result of merging one record
#[derive(Debug, Clone, PartialEq)]
pub struct Merged<T> {
    pub value: T,
    /// Dotted paths of scalar fields where base, local and server all differ
    pub conflicting_fields: Vec<String>,
}

impl<T> Merged<T> {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicting_fields.is_empty()
    }
}

/// Merges three optional JSON records.
///
/// Missing sides degrade gracefully: without a base, server fields overlay
/// local ones; without a local record, the server (or base) wins; without a
/// server record, local fields overlay the base.
pub fn merge_values(base: Option<&Value>, local: Option<&Value>, server: Option<&Value>) -> Value {
    let mut conflicts = Vec::new();
    merge_at("", base, local, server, &mut conflicts)
}

/// Typed three-way merge that also reports conflicting fields
pub fn three_way_merge<T>(base: &T, local: &T, server: &T) -> Result<Merged<T>>
where
    T: Serialize + DeserializeOwned,
{
    let merged = merge_json(
        &serde_json::to_value(base)?,
        &serde_json::to_value(local)?,
        &serde_json::to_value(server)?,
    );

    Ok(Merged {
        value: serde_json::from_value(merged.value)?,
        conflicting_fields: merged.conflicting_fields,
    })
}

/// Three-way merge of JSON records that also reports conflicting fields
pub fn merge_json(base: &Value, local: &Value, server: &Value) -> Merged<Value> {
    let mut conflicting_fields = Vec::new();
    let value = merge_at(
        "",
        Some(base),
        Some(local),
        Some(server),
        &mut conflicting_fields,
    );
    Merged {
        value,
        conflicting_fields,
    }
}

/// The record as it probably stood at the last sync: the local one with its
/// version stepped back by one
pub fn approximate_base(local: &Value) -> Value {
    let mut base = local.clone();
    if let Some(version) = base.get("version").and_then(Value::as_u64) {
        base["version"] = Value::from(version.saturating_sub(1));
    }
    base
}

fn overlay(target: &mut Map<String, Value>, source: Option<&Value>) {
    if let Some(Value::Object(fields)) = source {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn merge_at(
    path: &str,
    base: Option<&Value>,
    local: Option<&Value>,
    server: Option<&Value>,
    conflicts: &mut Vec<String>,
) -> Value {
    fn present(value: Option<&Value>) -> Option<&Value> {
        value.filter(|v| !v.is_null())
    }
    let (base, local, server) = (present(base), present(local), present(server));

    match (base, local, server) {
        (None, None, None) => Value::Object(Map::new()),
        (None, local, server) => {
            let mut merged = Map::new();
            overlay(&mut merged, local);
            overlay(&mut merged, server);
            Value::Object(merged)
        }
        (Some(base), None, server) => server.unwrap_or(base).clone(),
        (Some(base), Some(local), None) => {
            let mut merged = Map::new();
            overlay(&mut merged, Some(base));
            overlay(&mut merged, Some(local));
            Value::Object(merged)
        }
        (Some(base), Some(local), Some(server)) => {
            let Value::Object(local_fields) = local else {
                return server.clone();
            };
            let mut merged = match server {
                Value::Object(fields) => fields.clone(),
                _ => Map::new(),
            };

            for (key, local_value) in local_fields {
                let base_value = base.get(key);
                let server_value = server.get(key);
                let field_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };

                match local_value {
                    Value::Object(_) => {
                        let empty = Value::Object(Map::new());
                        let nested = merge_at(
                            &field_path,
                            base_value,
                            Some(local_value),
                            Some(server_value.unwrap_or(&empty)),
                            conflicts,
                        );
                        merged.insert(key.clone(), nested);
                    }
                    Value::Array(_) => {
                        if Some(local_value) != base_value {
                            merged.insert(key.clone(), local_value.clone());
                        }
                    }
                    scalar => {
                        let edited_locally = Some(scalar) != base_value;
                        if edited_locally && Some(scalar) != server_value {
                            merged.insert(key.clone(), scalar.clone());

                            let edited_remotely = server_value != base_value;
                            if edited_remotely && !BOOKKEEPING_FIELDS.contains(&key.as_str()) {
                                conflicts.push(field_path);
                            }
                        }
                    }
                }
            }

            Value::Object(merged)
        }
    }
}
