use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

use geojson::{FeatureCollection, GeoJson};
use log::info;
use serde_json::Value;

use crate::error::{ImportError, Result};

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ImportError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ImportError::Io(e),
    })?;
    Ok(BufReader::new(file))
}

/// Reads any JSON document without imposing GeoJSON structure on it.
pub fn read_document(path: &Path) -> Result<Value> {
    let reader = open(path)?;
    serde_json::from_reader(reader).map_err(|e| ImportError::MalformedDocument {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

// Function to load a feature collection from a GeoJSON file
pub fn load_feature_collection(path: &Path) -> Result<FeatureCollection> {
    info!("Loading file: {}", path.display());
    let reader = open(path)?;

    let geojson = GeoJson::from_reader(reader).map_err(|e| ImportError::MalformedDocument {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    match geojson {
        GeoJson::FeatureCollection(fc) => {
            info!("Found {} features in file", fc.features.len());
            Ok(fc)
        }
        GeoJson::Feature(_) => Err(ImportError::MalformedDocument {
            path: path.to_path_buf(),
            reason: "expected a FeatureCollection, found a Feature".to_string(),
        }),
        GeoJson::Geometry(_) => Err(ImportError::MalformedDocument {
            path: path.to_path_buf(),
            reason: "expected a FeatureCollection, found a bare Geometry".to_string(),
        }),
    }
}

/// Name of a GeoJSON geometry variant as it appears in the `type` member.
pub fn geometry_type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}
