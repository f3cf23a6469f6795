use geojson::Feature;
use postgres::types::ToSql;
use serde_json::Value;

use crate::analyzer::SqlType;
use crate::error::{ImportError, Result};
use crate::mapping::{ColumnMapping, TableMapping, WriteMode};

/// A single bound parameter, typed to match its destination column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Bool(Option<bool>),
    Int(Option<i32>),
    Real(Option<f64>),
    Text(Option<String>),
}

impl SqlParam {
    pub fn null(kind: SqlType) -> Self {
        match kind {
            SqlType::Boolean => SqlParam::Bool(None),
            SqlType::Integer => SqlParam::Int(None),
            SqlType::Real => SqlParam::Real(None),
            SqlType::Text => SqlParam::Text(None),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            SqlParam::Bool(v) => v.is_none(),
            SqlParam::Int(v) => v.is_none(),
            SqlParam::Real(v) => v.is_none(),
            SqlParam::Text(v) => v.is_none(),
        }
    }

    /// Null, or text that is empty once trimmed.
    pub fn is_blank(&self) -> bool {
        match self {
            SqlParam::Text(Some(s)) => s.trim().is_empty(),
            other => other.is_null(),
        }
    }

    pub fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlParam::Bool(v) => v,
            SqlParam::Int(v) => v,
            SqlParam::Real(v) => v,
            SqlParam::Text(v) => v,
        }
    }
}

fn integer_from_f64(f: f64) -> Option<i32> {
    if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 {
        Some(f as i32)
    } else {
        None
    }
}

/// Converts a property value into `kind`, accepting only lossless coercions.
/// Returns `None` when the value cannot be represented.
pub fn coerce(value: &Value, kind: SqlType) -> Option<SqlParam> {
    if value.is_null() {
        return Some(SqlParam::null(kind));
    }
    match kind {
        SqlType::Boolean => match value {
            Value::Bool(b) => Some(SqlParam::Bool(Some(*b))),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(SqlParam::Bool(Some(true))),
                "false" => Some(SqlParam::Bool(Some(false))),
                _ => None,
            },
            _ => None,
        },
        SqlType::Integer => match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i32::try_from(i).ok().map(|i| SqlParam::Int(Some(i)))
                } else {
                    n.as_f64()
                        .and_then(integer_from_f64)
                        .map(|i| SqlParam::Int(Some(i)))
                }
            }
            Value::String(s) => s.trim().parse::<i32>().ok().map(|i| SqlParam::Int(Some(i))),
            _ => None,
        },
        SqlType::Real => match value {
            Value::Number(n) => n.as_f64().map(|f| SqlParam::Real(Some(f))),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| SqlParam::Real(Some(f))),
            _ => None,
        },
        SqlType::Text => match value {
            Value::String(s) => Some(SqlParam::Text(Some(s.clone()))),
            Value::Number(n) => Some(SqlParam::Text(Some(n.to_string()))),
            Value::Bool(b) => Some(SqlParam::Text(Some(b.to_string()))),
            _ => None,
        },
    }
}

fn bind_property(feature: &Feature, index: usize, column: &ColumnMapping) -> Result<SqlParam> {
    match feature.property(&column.property) {
        None => Ok(SqlParam::null(column.kind)),
        Some(value) => coerce(value, column.kind).ok_or_else(|| ImportError::TypeMismatch {
            feature: index,
            property: column.property.clone(),
            kind: column.kind,
            value: value.to_string(),
        }),
    }
}

/// Parameters for one feature's statement, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct RowParams {
    pub values: Vec<SqlParam>,
}

impl RowParams {
    pub fn as_sql(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values.iter().map(SqlParam::as_sql).collect()
    }
}

/// Builds the parameters for `feature` in the order the statement from
/// [`crate::sql::write_statement`] expects them:
///
/// - insert: `[parent id,] columns..., geometry`
/// - update: `columns..., geometry, key`
///
/// Returns `Ok(None)` for an update whose key property is missing, null or
/// blank text.
pub fn map_feature(
    feature: &Feature,
    index: usize,
    mapping: &TableMapping,
    parent_id: Option<i32>,
) -> Result<Option<RowParams>> {
    let mut values = Vec::with_capacity(mapping.columns.len() + 3);

    if mapping.parent.is_some() {
        values.push(SqlParam::Int(parent_id));
    }
    for column in &mapping.columns {
        values.push(bind_property(feature, index, column)?);
    }

    let geometry = match &feature.geometry {
        Some(geometry) => Some(serde_json::to_string(geometry)?),
        None => None,
    };
    values.push(SqlParam::Text(geometry));

    if let WriteMode::Update { key } = &mapping.write {
        let key_value = bind_property(feature, index, key)?;
        if key_value.is_blank() {
            return Ok(None);
        }
        values.push(key_value);
    }

    Ok(Some(RowParams { values }))
}
