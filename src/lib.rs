use std::path::{Path, PathBuf};

pub mod analyzer;
pub mod db;
pub mod deciles;
pub mod error;
pub mod importer;
pub mod loader;
pub mod mapper;
pub mod mapping;
pub mod reproject;
pub mod schema;
pub mod splitter;
pub mod sql;
pub mod validator;

pub use error::{ImportError, Result};
pub use importer::{ImportSummary, ImportVariant};
pub use mapping::TableMapping;

use analyzer::Analysis;
use db::DbConfig;
use splitter::GroupOutput;

pub fn analyze_file(path: &Path) -> Result<Option<Analysis>> {
    let collection = loader::load_feature_collection(path)?;
    Ok(analyzer::analyze(&collection))
}

pub fn split_file(path: &Path, property: &str, output_dir: &Path) -> Result<Vec<GroupOutput>> {
    let collection = loader::load_feature_collection(path)?;
    splitter::split_collection(collection, property, output_dir)
}

/// What an import run writes and where its parent name comes from.
pub struct ImportRequest {
    pub file: PathBuf,
    pub mapping: TableMapping,
    pub parent_name: Option<String>,
}

impl ImportRequest {
    pub fn new(file: PathBuf, mapping: TableMapping) -> Self {
        Self {
            file,
            mapping,
            parent_name: None,
        }
    }

    /// Explicit name if given, else derived from the file name when the
    /// mapping has a parent.
    pub fn resolved_parent_name(&self) -> Option<String> {
        self.mapping.parent.as_ref()?;
        self.parent_name
            .clone()
            .or_else(|| importer::parent_name_from_path(&self.file))
    }
}

/// Validates the mapping, loads the file, then opens the connection and
/// imports. The connection is closed on return, success or not.
pub fn import_file(request: &ImportRequest, db: &DbConfig) -> Result<ImportSummary> {
    request.mapping.validate()?;
    let collection = loader::load_feature_collection(&request.file)?;
    let parent_name = request.resolved_parent_name();

    let mut client = db.connect()?;
    importer::run_import(
        &mut client,
        &request.mapping,
        &collection.features,
        parent_name.as_deref(),
    )
}

pub fn init_schema(db: &DbConfig) -> Result<()> {
    let mut client = db.connect()?;
    schema::init_schema(&mut client)
}
