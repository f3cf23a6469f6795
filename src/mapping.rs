//! Property to column mappings for the import pipelines.
//!
//! A [`TableMapping`] says which GeoJSON property feeds which column of which
//! table, with what scalar kind, and how rows are written. The built-in
//! mappings cover the county, parcel and VPA tables; any other layout can be
//! supplied as JSON and is checked once by [`TableMapping::validate`] before
//! anything touches the database.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analyzer::SqlType;
use crate::error::{ImportError, Result};

pub const DEFAULT_SRID: i32 = 4326;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub property: String,
    pub column: String,
    pub kind: SqlType,
}

impl ColumnMapping {
    pub fn new(property: &str, column: &str, kind: SqlType) -> Self {
        Self {
            property: property.to_string(),
            column: column.to_string(),
            kind,
        }
    }
}

/// How each feature becomes a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum WriteMode {
    /// One new row per feature.
    #[default]
    Insert,
    /// Rewrite the row whose `key.column` equals the feature's `key.property`.
    Update { key: ColumnMapping },
}

impl WriteMode {
    /// Whether running the same file twice leaves the table as after one run.
    ///
    /// Inserts append a second copy of every row; updates rewrite the same
    /// values onto the same rows.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, WriteMode::Update { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryColumn {
    pub column: String,
    pub srid: i32,
}

impl Default for GeometryColumn {
    fn default() -> Self {
        Self {
            column: "geom".to_string(),
            srid: DEFAULT_SRID,
        }
    }
}

/// Named parent row (municipality, county) every imported row points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentIdentity {
    pub table: String,
    pub key_column: String,
    pub foreign_key: String,
}

/// Rank bucket back-fill run after all rows of a parent are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecileBackfill {
    pub source_column: String,
    pub target_column: String,
    #[serde(default = "default_buckets")]
    pub buckets: u32,
}

fn default_buckets() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    pub table: String,
    #[serde(default)]
    pub write: WriteMode,
    pub columns: Vec<ColumnMapping>,
    #[serde(default)]
    pub geometry: GeometryColumn,
    #[serde(default)]
    pub parent: Option<ParentIdentity>,
    #[serde(default)]
    pub deciles: Option<DecileBackfill>,
}

/// `[A-Za-z_][A-Za-z0-9_]*`, the only identifiers we splice into SQL text.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(what: &str, name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(ImportError::Config(format!("invalid {what} name '{name}'")))
    }
}

impl TableMapping {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|_| ImportError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        let mapping: TableMapping = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ImportError::Config(format!("{}: {e}", path.display())))?;
        mapping.validate()?;
        Ok(mapping)
    }

    pub fn validate(&self) -> Result<()> {
        check_identifier("table", &self.table)?;
        check_identifier("geometry column", &self.geometry.column)?;

        if self.columns.is_empty() {
            return Err(ImportError::Config(format!(
                "mapping for '{}' has no columns",
                self.table
            )));
        }
        if self.geometry.srid <= 0 {
            return Err(ImportError::Config(format!(
                "SRID must be positive, got {}",
                self.geometry.srid
            )));
        }

        let mut seen = HashSet::new();
        seen.insert(self.geometry.column.as_str());
        for column in &self.columns {
            check_identifier("column", &column.column)?;
            if !seen.insert(column.column.as_str()) {
                return Err(ImportError::Config(format!(
                    "column '{}' is mapped more than once",
                    column.column
                )));
            }
        }

        if let Some(parent) = &self.parent {
            check_identifier("parent table", &parent.table)?;
            check_identifier("parent key column", &parent.key_column)?;
            check_identifier("foreign key", &parent.foreign_key)?;
            if !seen.insert(parent.foreign_key.as_str()) {
                return Err(ImportError::Config(format!(
                    "foreign key '{}' is also mapped from a property",
                    parent.foreign_key
                )));
            }
        }

        if let WriteMode::Update { key } = &self.write {
            check_identifier("key column", &key.column)?;
            if seen.contains(key.column.as_str()) {
                return Err(ImportError::Config(format!(
                    "update key '{}' cannot also be a SET column",
                    key.column
                )));
            }
            if self.parent.is_some() {
                return Err(ImportError::Config(
                    "update mode cannot be combined with a parent identity".to_string(),
                ));
            }
        }

        if let Some(deciles) = &self.deciles {
            if self.parent.is_none() {
                return Err(ImportError::Config(
                    "decile back-fill needs a parent identity to scope it".to_string(),
                ));
            }
            if deciles.buckets == 0 {
                return Err(ImportError::Config("decile buckets must be at least 1".to_string()));
            }
            check_identifier("decile target column", &deciles.target_column)?;
            let source = self
                .columns
                .iter()
                .find(|c| c.column == deciles.source_column)
                .ok_or_else(|| {
                    ImportError::Config(format!(
                        "decile source column '{}' is not mapped",
                        deciles.source_column
                    ))
                })?;
            if !matches!(source.kind, SqlType::Integer | SqlType::Real) {
                return Err(ImportError::Config(format!(
                    "decile source column '{}' must be numeric",
                    deciles.source_column
                )));
            }
        }
        Ok(())
    }
}

const COUNTY_COLUMNS: &[(&str, &str, SqlType)] = &[
    ("DISTRICT", "district", SqlType::Integer),
    ("TSD_ID", "tsd_id", SqlType::Integer),
    ("OBJECTID_1", "objectid", SqlType::Integer),
    ("COUNTY_FIP", "county_fip", SqlType::Integer),
    ("COUNTYNUM", "county_num", SqlType::Integer),
    ("Shape__Area", "shape_area", SqlType::Real),
    ("Shape__Length", "shape_length", SqlType::Real),
];

const PARCEL_COLUMNS: &[(&str, &str, SqlType)] = &[
    ("OBJECTID", "objectid", SqlType::Integer),
    ("MergeID", "mergeid", SqlType::Text),
    ("ADDRESS", "address", SqlType::Text),
    ("YearBuilt", "yearbuilt", SqlType::Integer),
    ("CALC_AREA", "calc_area", SqlType::Real),
    ("U3Value", "u3value", SqlType::Integer),
    ("VPA", "vpa", SqlType::Real),
    ("LandVPA", "landvpa", SqlType::Integer),
    ("Txbl_Val", "txbl_val", SqlType::Integer),
    ("JURSCODE", "jurscode", SqlType::Text),
    ("ACCTID", "acctid", SqlType::Text),
    ("CITY", "city", SqlType::Text),
    ("ZIPCODE", "zipcode", SqlType::Text),
    ("OWNNAME1", "ownname1", SqlType::Text),
    ("OWNNAME2", "ownname2", SqlType::Text),
    ("LandUseU3", "landuseu3", SqlType::Text),
    ("LU", "lu", SqlType::Text),
    ("DESCLU", "desclu", SqlType::Text),
    ("DESCSTYL", "descstyl", SqlType::Text),
    ("DESCBLDG", "descbldg", SqlType::Text),
    ("NFMLNDVL", "nfmlndvl", SqlType::Integer),
    ("NFMIMPVL", "nfmimpvl", SqlType::Integer),
    ("NFMTTLVL", "nfmttlvl", SqlType::Integer),
    ("BLDG_STORY", "bldg_story", SqlType::Integer),
    ("RESIDENT", "resident", SqlType::Integer),
    ("Merge_", "merge_", SqlType::Text),
    ("New_Merge", "new_merge", SqlType::Text),
    ("Notes", "notes", SqlType::Text),
    ("Downtown", "downtown", SqlType::Text),
    ("FID1", "fid1", SqlType::Text),
    ("CityName", "cityname", SqlType::Text),
    ("InsideCore", "insidecore", SqlType::Text),
    ("OutsideCore", "outsidecore", SqlType::Text),
    ("YearBuiltCat", "yearbuiltcat", SqlType::Text),
    ("ImpValPerAcre", "impvalperacre", SqlType::Real),
    ("DT_Easton", "dt_easton", SqlType::Text),
    ("developed", "developed", SqlType::Text),
];

fn columns(table: &[(&str, &str, SqlType)]) -> Vec<ColumnMapping> {
    table
        .iter()
        .map(|(property, column, kind)| ColumnMapping::new(property, column, *kind))
        .collect()
}

fn municipality_parent() -> ParentIdentity {
    ParentIdentity {
        table: "municipality".to_string(),
        key_column: "name".to_string(),
        foreign_key: "municipality_id".to_string(),
    }
}

/// New county rows, name included.
pub fn county_mapping() -> TableMapping {
    let mut cols = vec![ColumnMapping::new("COUNTY", "name", SqlType::Text)];
    cols.extend(columns(COUNTY_COLUMNS));
    TableMapping {
        table: "county".to_string(),
        write: WriteMode::Insert,
        columns: cols,
        geometry: GeometryColumn::default(),
        parent: None,
        deciles: None,
    }
}

/// Fills in attributes and shape of counties that already exist by name.
pub fn county_update_mapping() -> TableMapping {
    TableMapping {
        table: "county".to_string(),
        write: WriteMode::Update {
            key: ColumnMapping::new("COUNTY", "name", SqlType::Text),
        },
        columns: columns(COUNTY_COLUMNS),
        geometry: GeometryColumn::default(),
        parent: None,
        deciles: None,
    }
}

pub fn parcel_mapping() -> TableMapping {
    TableMapping {
        table: "parcel".to_string(),
        write: WriteMode::Insert,
        columns: columns(PARCEL_COLUMNS),
        geometry: GeometryColumn::default(),
        parent: Some(municipality_parent()),
        deciles: None,
    }
}

pub fn parcel_deciles_mapping() -> TableMapping {
    TableMapping {
        deciles: Some(DecileBackfill {
            source_column: "vpa".to_string(),
            target_column: "vpa_decile".to_string(),
            buckets: default_buckets(),
        }),
        ..parcel_mapping()
    }
}

pub fn vpa_mapping() -> TableMapping {
    TableMapping {
        table: "barclay_vpa".to_string(),
        write: WriteMode::Insert,
        columns: columns(PARCEL_COLUMNS),
        geometry: GeometryColumn::default(),
        parent: None,
        deciles: None,
    }
}
