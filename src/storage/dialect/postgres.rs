//! PostgreSQL dialect.

use sea_query::{Alias, IntoTableRef, PostgresQueryBuilder};

use super::{Dialect, Statements, POSTGRES};
use crate::serializer::PayloadType;
use crate::storage::schema::{self, EventStore};

/// PostgreSQL dialect: `"<schema>"."event_store"`.
///
/// Writers of one stream are serialized with a transaction-scoped advisory
/// lock keyed on the stream id; writers of different streams never block
/// each other.
pub struct PostgresDialect {
    schema: String,
    statements: Statements,
}

impl PostgresDialect {
    pub fn new(schema: &str) -> Self {
        let table = (Alias::new(schema), EventStore::Table).into_table_ref();
        Self {
            schema: schema.to_string(),
            statements: Statements::build::<PostgresQueryBuilder>(table),
        }
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        POSTGRES
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn create_store(&self, payload_type: PayloadType) -> Vec<String> {
        schema::postgres_ddl(&self.schema, payload_type)
    }

    fn begin_write_statement(&self) -> &'static str {
        "BEGIN"
    }

    fn stream_lock_statement(&self) -> Option<&'static str> {
        Some("SELECT 1 FROM pg_advisory_xact_lock(hashtext($1))")
    }

    fn statements(&self) -> &Statements {
        &self.statements
    }
}
