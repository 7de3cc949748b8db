//! SQL dialects.
//!
//! A [`Dialect`] produces the DDL that bootstraps the store and the
//! parameterized DML templates the provider executes. Templates are built
//! once per provider with sea-query and carry positional placeholders only;
//! values are bound at execution time.

mod postgres;
mod sqlite;

use sea_query::{
    Expr, Order, Query, QueryBuilder, QueryStatementWriter, SimpleExpr, TableRef,
};

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use super::schema::EventStore;
use super::{Result, StoreError};
use crate::serializer::PayloadType;

/// Backend name reported by the sqlx PostgreSQL driver.
pub const POSTGRES: &str = "PostgreSQL";

/// Backend name reported by the sqlx SQLite driver.
pub const SQLITE: &str = "SQLite";

/// Parameterized DML templates.
///
/// Placeholder order per template:
/// - `insert`: stream id (nullable text), payload
/// - `select_all_ordered`: offset
/// - `select_by_stream_ordered`: stream id
/// - `select_by_stream_skip`: stream id, row limit, rows to skip
/// - `stream_version`: stream id
/// - `delete_by_stream`: stream id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statements {
    pub insert: String,
    pub select_all_ordered: String,
    pub select_by_stream_ordered: String,
    pub select_by_stream_skip: String,
    pub stream_version: String,
    pub delete_by_stream: String,
}

impl Statements {
    pub fn build<B>(table: TableRef) -> Self
    where
        B: QueryBuilder + Default,
    {
        let by_stream = || Expr::col(EventStore::StreamId).eq("");

        let insert = Query::insert()
            .into_table(table.clone())
            .columns([EventStore::StreamId, EventStore::Data])
            .values_panic([SimpleExpr::from(Option::<String>::None), "".into()])
            .build(B::default())
            .0;

        let select_all_ordered = Query::select()
            .columns([EventStore::Id, EventStore::Data])
            .from(table.clone())
            .and_where(Expr::col(EventStore::Id).gt(0i64))
            .order_by(EventStore::Id, Order::Asc)
            .build(B::default())
            .0;

        let select_by_stream_ordered = Query::select()
            .columns([EventStore::Id, EventStore::Data])
            .from(table.clone())
            .and_where(by_stream())
            .order_by(EventStore::Id, Order::Asc)
            .build(B::default())
            .0;

        // SQLite only accepts OFFSET after a LIMIT.
        let select_by_stream_skip = Query::select()
            .columns([EventStore::Id, EventStore::Data])
            .from(table.clone())
            .and_where(by_stream())
            .order_by(EventStore::Id, Order::Asc)
            .limit(1)
            .offset(1)
            .build(B::default())
            .0;

        let stream_version = Query::select()
            .expr(Expr::col(EventStore::Id).count())
            .from(table.clone())
            .and_where(by_stream())
            .build(B::default())
            .0;

        let delete_by_stream = Query::delete()
            .from_table(table)
            .and_where(by_stream())
            .build(B::default())
            .0;

        Self {
            insert,
            select_all_ordered,
            select_by_stream_ordered,
            select_by_stream_skip,
            stream_version,
            delete_by_stream,
        }
    }
}

/// Vendor-specific SQL for one schema.
pub trait Dialect: Send + Sync {
    /// Backend name this dialect serves.
    fn name(&self) -> &'static str;

    fn schema(&self) -> &str;

    /// Idempotent DDL creating the schema, table and stream index.
    fn create_store(&self, payload_type: PayloadType) -> Vec<String>;

    /// Statement opening a write transaction.
    fn begin_write_statement(&self) -> &'static str;

    /// Statement run right after [`begin_write_statement`](Self::begin_write_statement)
    /// that serializes writers of one stream until commit. Binds the stream id.
    ///
    /// `None` when opening the transaction already serializes all writers.
    fn stream_lock_statement(&self) -> Option<&'static str>;

    fn statements(&self) -> &Statements;

    fn insert_statement(&self) -> &str {
        &self.statements().insert
    }

    fn select_all_ordered_statement(&self) -> &str {
        &self.statements().select_all_ordered
    }

    fn select_by_stream_ordered_statement(&self) -> &str {
        &self.statements().select_by_stream_ordered
    }

    fn select_by_stream_skip_statement(&self) -> &str {
        &self.statements().select_by_stream_skip
    }

    fn stream_version_statement(&self) -> &str {
        &self.statements().stream_version
    }

    fn delete_by_stream_statement(&self) -> &str {
        &self.statements().delete_by_stream
    }

    /// Column holding the serialized event.
    fn payload_column(&self) -> &'static str {
        "data"
    }

    /// Column holding the global offset.
    fn offset_column(&self) -> &'static str {
        "id"
    }
}

/// Select the dialect for a backend by its exact name.
pub fn dialect_for(database_name: &str, schema: &str) -> Result<Box<dyn Dialect>> {
    validate_schema(schema)?;

    match database_name {
        POSTGRES => Ok(Box::new(PostgresDialect::new(schema))),
        SQLITE => Ok(Box::new(SqliteDialect::new(schema))),
        other => Err(StoreError::UnsupportedDialect(other.to_string())),
    }
}

/// Schema names are spliced into DDL, so only plain identifiers are allowed.
fn validate_schema(schema: &str) -> Result<()> {
    let mut chars = schema.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                && schema.len() <= 48
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidSchema(schema.to_string()))
    }
}
