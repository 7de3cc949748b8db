//! Event table definition.
//!
//! Column identifiers for sea-query plus the per-database DDL. The DDL is
//! idempotent and runs on every provider startup.

use sea_query::Iden;

use crate::serializer::PayloadType;

/// Event table schema.
#[derive(Iden)]
pub enum EventStore {
    #[iden = "event_store"]
    Table,
    #[iden = "id"]
    Id,
    #[iden = "stream_id"]
    StreamId,
    #[iden = "data"]
    Data,
}

/// Unqualified table name.
pub const TABLE_NAME: &str = "event_store";

/// Unqualified stream index name.
pub const STREAM_INDEX_NAME: &str = "stream_idx";

/// PostgreSQL DDL for `schema`.
pub fn postgres_ddl(schema: &str, payload_type: PayloadType) -> Vec<String> {
    let data_type = match payload_type {
        PayloadType::Text => "TEXT",
        PayloadType::Binary => "BYTEA",
    };

    vec![
        format!(r#"CREATE SCHEMA IF NOT EXISTS "{schema}""#),
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema}"."{TABLE_NAME}" (
    id BIGSERIAL PRIMARY KEY,
    stream_id TEXT,
    data {data_type} NOT NULL
)"#
        ),
        format!(
            r#"CREATE INDEX IF NOT EXISTS "{STREAM_INDEX_NAME}" ON "{schema}"."{TABLE_NAME}" (stream_id NULLS LAST)"#
        ),
    ]
}

/// SQLite DDL for `schema`.
///
/// SQLite has no schemas inside a database file, so the schema name
/// prefixes the table and index names.
pub fn sqlite_ddl(schema: &str, payload_type: PayloadType) -> Vec<String> {
    let data_type = match payload_type {
        PayloadType::Text => "TEXT",
        PayloadType::Binary => "BLOB",
    };

    vec![
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema}_{TABLE_NAME}" (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stream_id TEXT,
    data {data_type} NOT NULL
)"#
        ),
        format!(
            r#"CREATE INDEX IF NOT EXISTS "{schema}_{STREAM_INDEX_NAME}" ON "{schema}_{TABLE_NAME}" (stream_id)"#
        ),
    ]
}
