//! Error types shared by every pipeline in the crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::analyzer::SqlType;

/// Errors surfaced by loading, mapping, writing and reprojecting features.
#[derive(Error, Debug)]
pub enum ImportError {
    /// Input file does not exist or cannot be opened
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Input parsed but is not the document shape we expect
    #[error("malformed document {}: {reason}", path.display())]
    MalformedDocument { path: PathBuf, reason: String },

    /// Could not reach or authenticate against the database
    #[error("database connection failed: {0}")]
    Connection(#[source] postgres::Error),

    /// A write was rejected by a table constraint (SQLSTATE class 23)
    #[error("constraint violation: {0}")]
    ConstraintViolation(#[source] postgres::Error),

    /// Any other database failure
    #[error("database error: {0}")]
    Database(#[source] postgres::Error),

    /// Invalid mapping or connection settings
    #[error("configuration error: {0}")]
    Config(String),

    /// A property value cannot be bound to its declared column kind
    #[error("feature {feature}: property '{property}' value {value} is not a valid {kind}")]
    TypeMismatch {
        feature: usize,
        property: String,
        kind: SqlType,
        value: String,
    },

    /// Coordinate transformation failed
    #[error("reprojection failed: {0}")]
    Reprojection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImportError {
    /// Classifies a postgres error raised after the connection is established.
    pub fn from_query(err: postgres::Error) -> Self {
        let integrity = err
            .code()
            .map(|state| state.code().starts_with("23"))
            .unwrap_or(false);
        if integrity {
            ImportError::ConstraintViolation(err)
        } else if err.is_closed() {
            ImportError::Connection(err)
        } else {
            ImportError::Database(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
