use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use geo::Geometry;
use geojson::{FeatureCollection, JsonObject};
use log::info;
use proj::{Proj, Transform};

use crate::error::{ImportError, Result};

pub const DEFAULT_TARGET_CRS: &str = "EPSG:4326";

/// CRS named by the legacy `crs` member, e.g.
/// `{"type": "name", "properties": {"name": "EPSG:26985"}}`.
pub fn declared_crs(foreign_members: Option<&JsonObject>) -> Option<String> {
    foreign_members?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

/// Transforms every geometry of the collection from `from` to `to`.
///
/// Properties are left untouched and the `crs` member is dropped from the
/// output.
pub fn reproject_collection(
    mut collection: FeatureCollection,
    from: &str,
    to: &str,
) -> Result<FeatureCollection> {
    let transformer = Proj::new_known_crs(from, to, None)
        .map_err(|e| ImportError::Reprojection(format!("{from} -> {to}: {e}")))?;

    for feature in collection.features.iter_mut() {
        let Some(geometry) = feature.geometry.take() else {
            continue;
        };
        let mut shape = Geometry::<f64>::try_from(geometry)
            .map_err(|e| ImportError::Reprojection(e.to_string()))?;
        shape
            .transform(&transformer)
            .map_err(|e| ImportError::Reprojection(e.to_string()))?;
        feature.geometry = Some(geojson::Geometry::new(geojson::Value::from(&shape)));
        feature.bbox = None;
    }

    collection.bbox = None;
    if let Some(members) = collection.foreign_members.as_mut() {
        members.remove("crs");
        if members.is_empty() {
            collection.foreign_members = None;
        }
    }
    Ok(collection)
}

pub fn reproject_file(
    input: &Path,
    output: &Path,
    from: Option<&str>,
    to: &str,
) -> Result<usize> {
    let collection = crate::loader::load_feature_collection(input)?;
    let source = match from {
        Some(crs) => crs.to_string(),
        None => declared_crs(collection.foreign_members.as_ref()).ok_or_else(|| {
            ImportError::Reprojection(format!(
                "{} does not declare a CRS; pass --from",
                input.display()
            ))
        })?,
    };

    info!("Reprojecting {} from {} to {}", input.display(), source, to);
    let reprojected = reproject_collection(collection, &source, to)?;
    let count = reprojected.features.len();

    let file = File::create(output)?;
    serde_json::to_writer(BufWriter::new(file), &reprojected)?;
    Ok(count)
}
