use std::fmt;
use std::path::Path;

use geojson::Feature;
use log::{debug, info, warn};
use postgres::Client;

use crate::db::Sink;
use crate::error::{ImportError, Result};
use crate::mapper::map_feature;
use crate::mapping::{self, TableMapping, WriteMode};
use crate::sql;

/// The import tools, each a built-in [`TableMapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportVariant {
    County,
    CountyUpdate,
    Parcel,
    ParcelDeciles,
    Vpa,
}

impl ImportVariant {
    pub const NAMES: [&'static str; 5] =
        ["county", "county-update", "parcel", "parcel-deciles", "vpa"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "county" => Some(ImportVariant::County),
            "county-update" => Some(ImportVariant::CountyUpdate),
            "parcel" => Some(ImportVariant::Parcel),
            "parcel-deciles" => Some(ImportVariant::ParcelDeciles),
            "vpa" => Some(ImportVariant::Vpa),
            _ => None,
        }
    }

    pub fn mapping(self) -> TableMapping {
        match self {
            ImportVariant::County => mapping::county_mapping(),
            ImportVariant::CountyUpdate => mapping::county_update_mapping(),
            ImportVariant::Parcel => mapping::parcel_mapping(),
            ImportVariant::ParcelDeciles => mapping::parcel_deciles_mapping(),
            ImportVariant::Vpa => mapping::vpa_mapping(),
        }
    }
}

/// Parent name derived from a file name: the first `_`-separated token,
/// capitalised. `BERLIN_VPA.geojson` gives `Berlin`. Names without `_` use
/// the file stem.
pub fn parent_name_from_path(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let token = match file_name.split_once('_') {
        Some((first, _)) => first,
        None => path.file_stem()?.to_str()?,
    };
    let mut chars = token.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect())
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub table: String,
    pub parent: Option<(String, i32)>,
    pub features: usize,
    pub rows_written: u64,
    pub skipped: usize,
    pub unmatched: usize,
    pub ranked: Option<u64>,
    pub idempotent: bool,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} features processed, {} rows written to {}",
            self.features, self.rows_written, self.table
        )?;
        if let Some((name, id)) = &self.parent {
            write!(f, " for {name} (id {id})")?;
        }
        if self.skipped > 0 {
            write!(f, ", {} skipped without key", self.skipped)?;
        }
        if self.unmatched > 0 {
            write!(f, ", {} matched no row", self.unmatched)?;
        }
        if let Some(ranked) = self.ranked {
            write!(f, ", {ranked} rows ranked")?;
        }
        if self.idempotent {
            write!(f, " (re-running rewrites the same rows)")
        } else {
            write!(f, " (re-running appends duplicate rows)")
        }
    }
}

impl ImportSummary {
    /// Closing line for the CLI, named after the parent row when there is one.
    pub fn confirmation(&self, file: &Path) -> String {
        let verb = if self.idempotent { "updated" } else { "inserted" };
        match &self.parent {
            Some((name, _)) => {
                format!("Data for {name} from {} {verb} successfully.", file.display())
            }
            None => format!("Data from {} {verb} successfully.", file.display()),
        }
    }
}

/// Resolves the parent row id, creating the row when it does not exist yet.
pub fn resolve_parent<S: Sink>(
    sink: &mut S,
    mapping: &TableMapping,
    name: &str,
) -> Result<Option<i32>> {
    let Some(parent) = &mapping.parent else {
        return Ok(None);
    };
    let id = sink.query_id(&sql::parent_upsert(parent), &[&name])?;
    info!("Using {} '{}' with id {}", parent.table, name, id);
    Ok(Some(id))
}

/// Writes every feature with one statement each, then runs the decile
/// back-fill if the mapping asks for one. Stops at the first failure.
pub fn write_features<S: Sink>(
    sink: &mut S,
    mapping: &TableMapping,
    features: &[Feature],
    parent_id: Option<i32>,
) -> Result<ImportSummary> {
    let statement = sql::write_statement(mapping);
    debug!("Write statement: {statement}");

    let mut summary = ImportSummary {
        table: mapping.table.clone(),
        features: features.len(),
        idempotent: mapping.write.is_idempotent(),
        ..ImportSummary::default()
    };
    let is_update = matches!(mapping.write, WriteMode::Update { .. });

    for (index, feature) in features.iter().enumerate() {
        if (index + 1) % 1000 == 0 {
            info!("Processing feature {}/{}", index + 1, features.len());
        }

        let Some(row) = map_feature(feature, index, mapping, parent_id)? else {
            warn!("Feature {index} has no update key, skipping");
            summary.skipped += 1;
            continue;
        };

        let affected = sink.execute(&statement, &row.as_sql())?;
        if is_update && affected == 0 {
            warn!("Feature {index} matched no row in {}", mapping.table);
            summary.unmatched += 1;
        }
        summary.rows_written += affected;
    }

    if let (Some(parent), Some(deciles), Some(id)) =
        (&mapping.parent, &mapping.deciles, parent_id)
    {
        let statement = sql::decile_backfill(&mapping.table, parent, deciles);
        let ranked = sink.execute(&statement, &[&id])?;
        info!(
            "Assigned {} buckets of {} to {} rows",
            deciles.buckets, deciles.source_column, ranked
        );
        summary.ranked = Some(ranked);
    }

    Ok(summary)
}

/// Runs one import against an open connection.
///
/// The parent upsert commits on its own; every feature write and the
/// back-fill share one transaction, committed once at the end. An error
/// drops the transaction, which rolls it back.
pub fn run_import(
    client: &mut Client,
    mapping: &TableMapping,
    features: &[Feature],
    parent_name: Option<&str>,
) -> Result<ImportSummary> {
    mapping.validate()?;

    let parent_id = match (&mapping.parent, parent_name) {
        (Some(_), Some(name)) => resolve_parent(client, mapping, name)?,
        (Some(parent), None) => {
            return Err(ImportError::Config(format!(
                "a {} name is required for table {}",
                parent.table, mapping.table
            )))
        }
        (None, _) => None,
    };

    let mut transaction = client.transaction().map_err(ImportError::from_query)?;
    let mut summary = write_features(&mut transaction, mapping, features, parent_id)?;
    transaction.commit().map_err(ImportError::from_query)?;

    if let (Some(name), Some(id)) = (parent_name, parent_id) {
        summary.parent = Some((name.to_string(), id));
    }
    Ok(summary)
}
