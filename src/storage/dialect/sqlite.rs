//! SQLite dialect.

use sea_query::{Alias, IntoTableRef, SqliteQueryBuilder};

use super::{Dialect, Statements, SQLITE};
use crate::serializer::PayloadType;
use crate::storage::schema::{self, TABLE_NAME};

pub struct SqliteDialect {
    schema: String,
    statements: Statements,
}

impl SqliteDialect {
    pub fn new(schema: &str) -> Self {
        let table = Alias::new(format!("{schema}_{TABLE_NAME}")).into_table_ref();
        Self {
            schema: schema.to_string(),
            statements: Statements::build::<SqliteQueryBuilder>(table),
        }
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        SQLITE
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    fn create_store(&self, payload_type: PayloadType) -> Vec<String> {
        schema::sqlite_ddl(&self.schema, payload_type)
    }

    // BEGIN IMMEDIATE takes the database write lock upfront, so the version
    // check and the insert see no concurrent writer.
    fn begin_write_statement(&self) -> &'static str {
        "BEGIN IMMEDIATE"
    }

    fn stream_lock_statement(&self) -> Option<&'static str> {
        None
    }

    fn statements(&self) -> &Statements {
        &self.statements
    }
}
