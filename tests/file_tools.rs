use std::fs;
use std::path::Path;

use geojson::FeatureCollection;
use geojson_importer::analyzer::SqlType;
use geojson_importer::{analyze_file, split_file, validator, ImportError, TableMapping};
use serde_json::{json, Value};

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
}

fn read_collection(path: &Path) -> FeatureCollection {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn parcels() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-76.6, 38.2]},
             "properties": {"County": "St. Mary's", "OBJECTID": 1}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-76.0, 38.7]},
             "properties": {"OBJECTID": 2}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-76.5, 38.3]},
             "properties": {"County": "St. Mary's", "OBJECTID": 3}}
        ]
    })
}

#[test]
fn split_writes_one_file_per_group() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("SLR_1ft_Remaining_Parcels.geojson");
    write_json(&input, &parcels());
    let out_dir = dir.path().join("by_county");

    let outputs = split_file(&input, "County", &out_dir).unwrap();
    assert_eq!(outputs.len(), 2);

    let mary = out_dir.join("St._Mary's.geojson");
    let unknown = out_dir.join("Unknown.geojson");
    assert!(mary.exists());
    assert!(unknown.exists());

    let mary_ids: Vec<i64> = read_collection(&mary)
        .features
        .iter()
        .map(|f| f.property("OBJECTID").and_then(Value::as_i64).unwrap())
        .collect();
    assert_eq!(mary_ids, vec![1, 3]);
    assert_eq!(read_collection(&unknown).features.len(), 1);

    let total: usize = outputs.iter().map(|o| o.feature_count).sum();
    assert_eq!(total, 3);

    // pretty-printed output spans several lines
    assert!(fs::read_to_string(&mary).unwrap().lines().count() > 1);
}

#[test]
fn split_then_concatenate_reconstructs_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("parcels.geojson");
    write_json(&input, &parcels());

    let outputs = split_file(&input, "County", dir.path()).unwrap();
    let mut ids: Vec<i64> = outputs
        .iter()
        .flat_map(|o| read_collection(&o.path).features)
        .map(|f| f.property("OBJECTID").and_then(Value::as_i64).unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn split_keeps_every_group_inside_out_dir() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("parcels.geojson");
    write_json(
        &input,
        &json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": null, "properties": {"County": "../escaped"}},
                {"type": "Feature", "geometry": null, "properties": {"County": "Kent/Talbot"}}
            ]
        }),
    );
    let out_dir = dir.path().join("out");

    let outputs = split_file(&input, "County", &out_dir).unwrap();
    assert_eq!(outputs.len(), 2);
    for output in &outputs {
        assert_eq!(output.path.parent(), Some(out_dir.as_path()));
        assert!(output.path.exists());
    }
    assert!(!dir.path().join("escaped.geojson").exists());
}

#[test]
fn validate_files() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.json");
    let feature = dir.path().join("feature.json");
    write_json(&good, &json!({"type": "FeatureCollection", "features": []}));
    write_json(&feature, &json!({"type": "Feature"}));

    assert!(validator::validate_file(&good).unwrap());
    assert!(!validator::validate_file(&feature).unwrap());
    assert!(matches!(
        validator::validate_file(&dir.path().join("absent.json")),
        Err(ImportError::FileNotFound { .. })
    ));
}

#[test]
fn analyze_reports_columns() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("parcels.geojson");
    write_json(&input, &parcels());

    let analysis = analyze_file(&input).unwrap().unwrap();
    assert_eq!(analysis.feature_count, 3);
    assert_eq!(analysis.column_types["County"], SqlType::Text);
    assert_eq!(analysis.column_types["OBJECTID"], SqlType::Integer);
    assert_eq!(analysis.geometry_types.len(), 1);
}

#[test]
fn analyze_empty_collection() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.geojson");
    write_json(&input, &json!({"type": "FeatureCollection", "features": []}));
    assert!(analyze_file(&input).unwrap().is_none());
}

#[test]
fn bundled_mapping_file_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("mappings/food_access_points.json");
    let mapping = TableMapping::from_file(&path).unwrap();
    assert_eq!(mapping.table, "food_access_points");
    assert_eq!(mapping.geometry.column, "geometry");
    assert!(!mapping.write.is_idempotent());
}

#[test]
fn invalid_mapping_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    write_json(
        &path,
        &json!({"table": "parcel; drop table parcel", "columns": [
            {"property": "A", "column": "a", "kind": "TEXT"}
        ]}),
    );
    assert!(matches!(
        TableMapping::from_file(&path),
        Err(ImportError::Config(_))
    ));
}
