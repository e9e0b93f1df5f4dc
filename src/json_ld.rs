/// JSON-LD helpers
///
/// Metadata attached to blob entries is treated as an opaque JSON-LD node.
/// We only check that it is structurally well formed and combine `@context`
/// values for response envelopes; expansion/compaction is left to consumers.
use crate::error::{BlobError, BlobResult};
use serde_json::Value;

/// Context every response carries before entry specific contexts
pub const SCHEMA_ORG_CONTEXT: &str = "https://schema.org";

/// Default vocabulary for blob storage terms
pub const DEFAULT_BLOB_STORAGE_CONTEXT: &str = "https://schema.blobstorage.dev/blob-storage/";

/// Keywords allowed as object keys
const KEYWORDS: &[&str] = &[
    "@base",
    "@container",
    "@context",
    "@direction",
    "@graph",
    "@id",
    "@import",
    "@included",
    "@index",
    "@json",
    "@language",
    "@list",
    "@nest",
    "@none",
    "@prefix",
    "@propagate",
    "@protected",
    "@reverse",
    "@set",
    "@type",
    "@value",
    "@version",
    "@vocab",
];

/// Validate that a value is a well formed JSON-LD node object
pub fn validate_node(node: &Value) -> BlobResult<()> {
    match node {
        Value::Object(_) => validate_value(node, "$"),
        _ => Err(invalid("$", "metadata must be a JSON-LD node object")),
    }
}

fn validate_value(value: &Value, path: &str) -> BlobResult<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = format!("{}.{}", path, key);

                if key.starts_with('@') && !KEYWORDS.contains(&key.as_str()) {
                    return Err(invalid(&child_path, "unknown JSON-LD keyword"));
                }

                match key.as_str() {
                    "@context" => validate_context(child, &child_path)?,
                    "@id" | "@vocab" | "@base" => {
                        if !child.is_string() {
                            return Err(invalid(&child_path, "must be a string"));
                        }
                    }
                    "@type" => {
                        let ok = match child {
                            Value::String(_) => true,
                            Value::Array(items) => items.iter().all(Value::is_string),
                            _ => false,
                        };
                        if !ok {
                            return Err(invalid(
                                &child_path,
                                "must be a string or array of strings",
                            ));
                        }
                    }
                    "@value" => {
                        if child.is_object() || child.is_array() {
                            return Err(invalid(&child_path, "must be a scalar"));
                        }
                    }
                    _ => validate_value(child, &child_path)?,
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                validate_value(item, &format!("{}[{}]", path, i))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_context(context: &Value, path: &str) -> BlobResult<()> {
    match context {
        Value::Null | Value::String(_) => Ok(()),
        Value::Object(_) => validate_value(context, path),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                match item {
                    Value::Null | Value::String(_) => {}
                    Value::Object(_) => validate_value(item, &item_path)?,
                    _ => {
                        return Err(invalid(
                            &item_path,
                            "context entries must be strings or objects",
                        ))
                    }
                }
            }
            Ok(())
        }
        _ => Err(invalid(path, "must be a string, object or array")),
    }
}

fn invalid(path: &str, message: &str) -> BlobError {
    BlobError::Validation(format!("Invalid JSON-LD metadata at {}: {}", path, message))
}

/// Flatten a `@context` value into its list of entries
fn context_entries(context: &Value) -> Vec<Value> {
    match context {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
        other => vec![other.clone()],
    }
}

/// Append the `@context` of a metadata node to `combined`, skipping duplicates
pub fn merge_context(combined: &mut Vec<Value>, metadata: Option<&Value>) {
    let Some(context) = metadata.and_then(|m| m.get("@context")) else {
        return;
    };

    for entry in context_entries(context) {
        if !combined.contains(&entry) {
            combined.push(entry);
        }
    }
}

/// Base context for a service configured with `vocabulary`
pub fn base_context(vocabulary: &str) -> Vec<Value> {
    let mut context = vec![Value::String(SCHEMA_ORG_CONTEXT.to_string())];
    if vocabulary != SCHEMA_ORG_CONTEXT {
        context.push(Value::String(vocabulary.to_string()));
    }
    context
}
