use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::loader::read_document;

/// Shallow structural check: a mapping whose `type` is `FeatureCollection`
/// and whose `features` is an array. Features themselves are not inspected.
pub fn is_feature_collection(document: &Value) -> bool {
    match document.as_object() {
        Some(object) => {
            object.get("type").and_then(Value::as_str) == Some("FeatureCollection")
                && object.get("features").map(Value::is_array).unwrap_or(false)
        }
        None => false,
    }
}

pub fn validate_file(path: &Path) -> Result<bool> {
    let document = read_document(path)?;
    Ok(is_feature_collection(&document))
}
