//! SQL text derived from a validated [`TableMapping`].
//!
//! Identifiers are spliced in verbatim, so callers must run
//! [`TableMapping::validate`] first; values always travel as `$n` parameters.
//!
//! Every placeholder carries a cast matching the Rust type it is bound with
//! (see [`crate::mapper::SqlParam`]). The server then converts to the real
//! column type, so a `REAL` (float4) or `BIGINT` column accepts the
//! `f64`/`i32` parameters.

use crate::analyzer::SqlType;
use crate::mapping::{DecileBackfill, ParentIdentity, TableMapping, WriteMode};

/// Postgres type the parameter for `kind` is bound as.
pub fn bind_type(kind: SqlType) -> &'static str {
    match kind {
        SqlType::Boolean => "boolean",
        SqlType::Integer => "integer",
        SqlType::Real => "double precision",
        SqlType::Text => "text",
    }
}

fn placeholder(index: usize, kind: SqlType) -> String {
    format!("${index}::{}", bind_type(kind))
}

fn geometry_expr(mapping: &TableMapping, index: usize) -> String {
    format!(
        "ST_SetSRID(ST_GeomFromGeoJSON({}), {})",
        placeholder(index, SqlType::Text),
        mapping.geometry.srid
    )
}

fn insert_statement(mapping: &TableMapping) -> String {
    let mut columns: Vec<(&str, SqlType)> = Vec::with_capacity(mapping.columns.len() + 1);
    if let Some(parent) = &mapping.parent {
        columns.push((parent.foreign_key.as_str(), SqlType::Integer));
    }
    columns.extend(mapping.columns.iter().map(|c| (c.column.as_str(), c.kind)));

    let mut values: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, (_, kind))| placeholder(i + 1, *kind))
        .collect();
    values.push(geometry_expr(mapping, columns.len() + 1));

    let mut names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    names.push(&mapping.geometry.column);

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        mapping.table,
        names.join(", "),
        values.join(", ")
    )
}

fn update_statement(mapping: &TableMapping, key_column: &str, key_kind: SqlType) -> String {
    let mut assignments: Vec<String> = mapping
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", c.column, placeholder(i + 1, c.kind)))
        .collect();
    let geometry_index = mapping.columns.len() + 1;
    assignments.push(format!(
        "{} = {}",
        mapping.geometry.column,
        geometry_expr(mapping, geometry_index)
    ));

    format!(
        "UPDATE {} SET {} WHERE {} = {}",
        mapping.table,
        assignments.join(", "),
        key_column,
        placeholder(geometry_index + 1, key_kind)
    )
}

/// The per-feature statement, with placeholders in the order produced by
/// [`crate::mapper::map_feature`].
pub fn write_statement(mapping: &TableMapping) -> String {
    match &mapping.write {
        WriteMode::Insert => insert_statement(mapping),
        WriteMode::Update { key } => update_statement(mapping, &key.column, key.kind),
    }
}

/// Get-or-create of the parent row in one statement.
///
/// The no-op `DO UPDATE` makes `RETURNING` yield the id for an existing row
/// too. Requires a unique constraint on the key column.
pub fn parent_upsert(parent: &ParentIdentity) -> String {
    format!(
        "INSERT INTO {table} ({key}) VALUES ($1::text) \
         ON CONFLICT ({key}) DO UPDATE SET {key} = EXCLUDED.{key} \
         RETURNING id",
        table = parent.table,
        key = parent.key_column
    )
}

/// Ranks every row of one parent into `buckets` groups and stores the bucket.
pub fn decile_backfill(
    table: &str,
    parent: &ParentIdentity,
    deciles: &DecileBackfill,
) -> String {
    format!(
        "WITH ranked AS (\
         SELECT id, NTILE({buckets}) OVER (ORDER BY {source}) AS bucket \
         FROM {table} WHERE {fk} = $1::integer) \
         UPDATE {table} SET {target} = ranked.bucket \
         FROM ranked WHERE {table}.id = ranked.id",
        buckets = deciles.buckets,
        source = deciles.source_column,
        target = deciles.target_column,
        fk = parent.foreign_key,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{
        county_mapping, county_update_mapping, parcel_deciles_mapping, parcel_mapping,
        vpa_mapping, ColumnMapping,
    };

    #[test]
    fn county_insert() {
        assert_eq!(
            write_statement(&county_mapping()),
            "INSERT INTO county (name, district, tsd_id, objectid, county_fip, county_num, \
             shape_area, shape_length, geom) VALUES ($1::text, $2::integer, $3::integer, \
             $4::integer, $5::integer, $6::integer, $7::double precision, \
             $8::double precision, ST_SetSRID(ST_GeomFromGeoJSON($9::text), 4326))"
        );
    }

    #[test]
    fn county_update() {
        assert_eq!(
            write_statement(&county_update_mapping()),
            "UPDATE county SET district = $1::integer, tsd_id = $2::integer, \
             objectid = $3::integer, county_fip = $4::integer, county_num = $5::integer, \
             shape_area = $6::double precision, shape_length = $7::double precision, \
             geom = ST_SetSRID(ST_GeomFromGeoJSON($8::text), 4326) WHERE name = $9::text"
        );
    }

    #[test]
    fn placeholders_are_cast_to_the_bound_type() {
        let mut mapping = vpa_mapping();
        mapping.columns = vec![
            ColumnMapping::new("A", "flag", SqlType::Boolean),
            ColumnMapping::new("B", "big_count", SqlType::Integer),
            ColumnMapping::new("C", "float4_value", SqlType::Real),
            ColumnMapping::new("D", "label", SqlType::Text),
        ];
        let sql = write_statement(&mapping);
        assert!(sql.contains(
            "VALUES ($1::boolean, $2::integer, $3::double precision, $4::text, \
             ST_SetSRID(ST_GeomFromGeoJSON($5::text), 4326))"
        ));
    }

    #[test]
    fn parcel_insert_leads_with_foreign_key() {
        let sql = write_statement(&parcel_mapping());
        assert!(sql.starts_with("INSERT INTO parcel (municipality_id, objectid, mergeid,"));
        assert!(sql.contains("VALUES ($1::integer, $2::integer, $3::text,"));
        assert!(sql.ends_with("ST_SetSRID(ST_GeomFromGeoJSON($39::text), 4326))"));
    }

    #[test]
    fn vpa_has_no_foreign_key() {
        let sql = write_statement(&vpa_mapping());
        assert!(sql.starts_with("INSERT INTO barclay_vpa (objectid,"));
        assert!(sql.contains("ST_GeomFromGeoJSON($38::text)"));
    }

    #[test]
    fn upsert_returns_id() {
        let mapping = parcel_mapping();
        let sql = parent_upsert(mapping.parent.as_ref().unwrap());
        assert_eq!(
            sql,
            "INSERT INTO municipality (name) VALUES ($1::text) ON CONFLICT (name) \
             DO UPDATE SET name = EXCLUDED.name RETURNING id"
        );
    }

    #[test]
    fn decile_statement_is_scoped_to_parent() {
        let mapping = parcel_deciles_mapping();
        let sql = decile_backfill(
            &mapping.table,
            mapping.parent.as_ref().unwrap(),
            mapping.deciles.as_ref().unwrap(),
        );
        assert!(sql.contains("NTILE(10) OVER (ORDER BY vpa)"));
        assert!(sql.contains("WHERE municipality_id = $1::integer"));
        assert!(sql.contains("UPDATE parcel SET vpa_decile = ranked.bucket"));
    }
}
