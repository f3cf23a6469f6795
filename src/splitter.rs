use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use geojson::{Feature, FeatureCollection};
use log::info;
use serde_json::Value;

use crate::error::Result;

/// Group name used when a feature has no value for the grouping property.
pub const UNKNOWN_GROUP: &str = "Unknown";

pub struct GroupOutput {
    pub name: String,
    pub path: PathBuf,
    pub feature_count: usize,
}

/// Filesystem-safe group name for a property value.
///
/// Spaces and path separators become `_`, as does a leading `.`, so every
/// name stays a plain file inside the output directory.
pub fn group_name(value: Option<&Value>) -> String {
    let raw = match value {
        None | Some(Value::Null) => return UNKNOWN_GROUP.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    if raw.trim().is_empty() {
        return UNKNOWN_GROUP.to_string();
    }

    let mut name: String = raw
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    if name.starts_with('.') {
        name.replace_range(..1, "_");
    }
    name
}

/// Groups features by `property`, keeping input order inside each group.
pub fn group_features(
    features: Vec<Feature>,
    property: &str,
) -> BTreeMap<String, Vec<Feature>> {
    let mut groups: BTreeMap<String, Vec<Feature>> = BTreeMap::new();
    for feature in features {
        let value = feature
            .properties
            .as_ref()
            .and_then(|props| props.get(property));
        let name = group_name(value);
        groups.entry(name).or_default().push(feature);
    }
    groups
}

fn write_group(output_dir: &Path, name: &str, features: Vec<Feature>) -> Result<GroupOutput> {
    let output_path = output_dir.join(format!("{name}.geojson"));
    let feature_count = features.len();

    let feature_collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let file = File::create(&output_path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &feature_collection)?;

    Ok(GroupOutput {
        name: name.to_string(),
        path: output_path,
        feature_count,
    })
}

/// Writes one pretty-printed collection per group into `output_dir`.
pub fn split_collection(
    collection: FeatureCollection,
    property: &str,
    output_dir: &Path,
) -> Result<Vec<GroupOutput>> {
    create_dir_all(output_dir)?;
    let groups = group_features(collection.features, property);
    info!(
        "Splitting by '{}' into {} groups under {}",
        property,
        groups.len(),
        output_dir.display()
    );

    let mut outputs = Vec::with_capacity(groups.len());
    for (name, features) in groups {
        outputs.push(write_group(output_dir, &name, features)?);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(props: Value) -> Feature {
        serde_json::from_value(json!({
            "type": "Feature",
            "geometry": null,
            "properties": props
        }))
        .unwrap()
    }

    #[test]
    fn spaces_become_underscores() {
        assert_eq!(group_name(Some(&json!("St. Mary's"))), "St._Mary's");
        assert_eq!(group_name(Some(&json!("Queen Anne's"))), "Queen_Anne's");
    }

    #[test]
    fn names_cannot_leave_the_output_directory() {
        assert_eq!(group_name(Some(&json!("../escaped"))), "_._escaped");
        assert_eq!(group_name(Some(&json!("Kent/Talbot"))), "Kent_Talbot");
        assert_eq!(group_name(Some(&json!("a\\b"))), "a_b");
        assert_eq!(group_name(Some(&json!(".hidden"))), "_hidden");
        assert_eq!(group_name(Some(&json!(""))), UNKNOWN_GROUP);
        assert_eq!(group_name(Some(&json!("  "))), UNKNOWN_GROUP);
    }

    #[test]
    fn missing_and_null_fall_back() {
        assert_eq!(group_name(None), UNKNOWN_GROUP);
        assert_eq!(group_name(Some(&Value::Null)), UNKNOWN_GROUP);
    }

    #[test]
    fn non_string_values_use_json_text() {
        assert_eq!(group_name(Some(&json!(24))), "24");
    }

    #[test]
    fn groups_preserve_order() {
        let features = vec![
            feature(json!({"County": "Kent", "n": 1})),
            feature(json!({"County": "Talbot", "n": 2})),
            feature(json!({"County": "Kent", "n": 3})),
            feature(json!({"n": 4})),
        ];
        let groups = group_features(features, "County");
        assert_eq!(groups.len(), 3);
        let kent: Vec<i64> = groups["Kent"]
            .iter()
            .map(|f| f.property("n").and_then(Value::as_i64).unwrap())
            .collect();
        assert_eq!(kent, vec![1, 3]);
        assert_eq!(groups[UNKNOWN_GROUP].len(), 1);
    }
}
