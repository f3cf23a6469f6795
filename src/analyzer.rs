//! Column type inference over the properties of a feature collection.
//!
//! The analyzer is a planning aid: it reports which geometry types a file
//! contains and a suggested SQL type for every property key, so a table (or a
//! [`TableMapping`](crate::mapping::TableMapping)) can be written for it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::loader::geometry_type_name;

/// Scalar column kinds understood by the analyzer and the importers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Boolean,
    Integer,
    Real,
    Text,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        };
        f.write_str(name)
    }
}

/// Boolean wins over integer, integer over float; everything else is text.
pub fn infer_sql_type(value: &Value) -> SqlType {
    match value {
        Value::Bool(_) => SqlType::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => SqlType::Integer,
        Value::Number(_) => SqlType::Real,
        _ => SqlType::Text,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub feature_count: usize,
    pub geometry_types: BTreeSet<String>,
    pub column_types: BTreeMap<String, SqlType>,
}

/// Returns `None` when the collection has no features.
///
/// The first non-null value seen for a key decides its type; later values
/// are not consulted.
pub fn analyze(collection: &FeatureCollection) -> Option<Analysis> {
    if collection.features.is_empty() {
        return None;
    }

    let mut geometry_types = BTreeSet::new();
    let mut column_types = BTreeMap::new();

    for feature in &collection.features {
        if let Some(geometry) = &feature.geometry {
            geometry_types.insert(geometry_type_name(&geometry.value).to_string());
        }

        if let Some(properties) = &feature.properties {
            for (key, value) in properties {
                if value.is_null() || column_types.contains_key(key) {
                    continue;
                }
                column_types.insert(key.clone(), infer_sql_type(value));
            }
        }
    }

    Some(Analysis {
        feature_count: collection.features.len(),
        geometry_types,
        column_types,
    })
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total features: {}", self.feature_count)?;
        if self.geometry_types.is_empty() {
            writeln!(f, "Geometry types found: None")?;
        } else {
            let types: Vec<&str> = self.geometry_types.iter().map(String::as_str).collect();
            writeln!(f, "Geometry types found: {}", types.join(", "))?;
        }

        if self.column_types.is_empty() {
            writeln!(f, "No columns found in 'properties'.")
        } else {
            writeln!(f, "Detected columns and suggested SQL types:")?;
            for (column, sql_type) in &self.column_types {
                writeln!(f, "  {column} -> {sql_type}")?;
            }
            Ok(())
        }
    }
}
