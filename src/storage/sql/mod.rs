//! SQL store provider.
//!
//! One implementation serves every supported database: the backend is
//! discovered from the pool at construction and everything vendor-specific
//! comes from its [`Dialect`].

mod cursor;
mod transaction;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Any, AnyConnection, AnyPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use self::cursor::{Bind, RowDecoder};
use self::transaction::WriteTransaction;
use super::dialect::{self, Dialect, POSTGRES};
use super::{EventStream, Lifecycle, Result, StoreError, StoreProvider, StoreState};
use crate::config::StorageConfig;
use crate::event::Event;
use crate::serializer::{new_event_serializer, EventSerializer, Payload, PayloadType, TypeRegistry};

const POSTGRES_DEFAULT_SCHEMA: &str = "public";
const SQLITE_DEFAULT_SCHEMA: &str = "main";

/// Event store provider over a sqlx `Any` pool.
pub struct SqlStoreProvider {
    pool: AnyPool,
    dialect: Arc<dyn Dialect>,
    serializer: Arc<dyn EventSerializer>,
    lifecycle: Lifecycle,
}

impl SqlStoreProvider {
    /// Create a provider in the connection's current schema.
    ///
    /// Detects the backend, creates the table and index if missing, and
    /// returns an operational provider.
    pub async fn new(
        pool: AnyPool,
        payload_type: PayloadType,
        registry: Arc<TypeRegistry>,
    ) -> Result<Self> {
        Self::bootstrap(pool, payload_type, registry, None).await
    }

    /// Create a provider in an explicit schema.
    pub async fn with_schema(
        pool: AnyPool,
        payload_type: PayloadType,
        registry: Arc<TypeRegistry>,
        schema: &str,
    ) -> Result<Self> {
        Self::bootstrap(pool, payload_type, registry, Some(schema)).await
    }

    /// Connect and create a provider from configuration.
    pub async fn from_config(config: &StorageConfig, registry: Arc<TypeRegistry>) -> Result<Self> {
        let pool = super::connect(config).await?;
        Self::bootstrap(pool, config.payload_type, registry, config.schema.as_deref()).await
    }

    async fn bootstrap(
        pool: AnyPool,
        payload_type: PayloadType,
        registry: Arc<TypeRegistry>,
        schema: Option<&str>,
    ) -> Result<Self> {
        let lifecycle = Lifecycle::new();
        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| bootstrap_failed(&lifecycle, e))?;

        let backend = conn.backend_name().to_string();
        let schema = match schema {
            Some(schema) => schema.to_string(),
            None => current_schema(&mut conn, &backend)
                .await
                .map_err(|e| bootstrap_failed(&lifecycle, e))?,
        };
        let dialect: Arc<dyn Dialect> = dialect::dialect_for(&backend, &schema)?.into();
        lifecycle.advance(StoreState::Bootstrapped);

        for statement in dialect.create_store(payload_type) {
            sqlx::query(&statement)
                .execute(&mut *conn)
                .await
                .map_err(|e| bootstrap_failed(&lifecycle, e))?;
        }
        drop(conn);

        lifecycle.advance(StoreState::Operational);
        info!(
            backend = %backend,
            schema = %schema,
            payload_type = %payload_type,
            "Event store ready"
        );

        Ok(Self {
            pool,
            dialect,
            serializer: new_event_serializer(payload_type, registry),
            lifecycle,
        })
    }

    pub fn state(&self) -> StoreState {
        self.lifecycle.state()
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn payload_type(&self) -> PayloadType {
        self.serializer.payload_type()
    }

    fn decoder(&self) -> RowDecoder {
        RowDecoder {
            serializer: self.serializer.clone(),
            offset_column: self.dialect.offset_column(),
            payload_column: self.dialect.payload_column(),
            lifecycle: self.lifecycle.clone(),
        }
    }

    async fn open_cursor(&self, sql: &str, binds: Vec<Bind>) -> Result<EventStream> {
        self.lifecycle.ensure_operational()?;
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| self.lifecycle.observe(e))?;
        Ok(cursor::spawn(conn, sql.to_string(), binds, self.decoder()))
    }

    async fn insert(&self, conn: &mut AnyConnection, stream: Option<String>, payload: Payload) -> Result<()> {
        let query = sqlx::query(self.dialect.insert_statement()).bind(stream);
        let query = match payload {
            Payload::Text(text) => query.bind(text),
            Payload::Binary(bytes) => query.bind(bytes),
        };
        query
            .execute(conn)
            .await
            .map_err(|e| self.lifecycle.observe(e))?;
        Ok(())
    }

    async fn version_on(&self, conn: &mut AnyConnection, stream: &str) -> Result<i64> {
        let row = sqlx::query(self.dialect.stream_version_statement())
            .bind(stream.to_string())
            .fetch_one(conn)
            .await
            .map_err(|e| self.lifecycle.observe(e))?;
        row.try_get(0).map_err(|e| self.lifecycle.observe(e))
    }

    /// Version check and insert inside an open stream transaction.
    async fn append(
        &self,
        tx: &mut WriteTransaction,
        stream: &str,
        expected: Option<i64>,
        payload: Payload,
    ) -> Result<()> {
        if let Some(expected) = expected {
            let actual = self.version_on(tx.connection(), stream).await?;
            if actual != expected {
                debug!(stream = %stream, expected, actual, "Stream version mismatch");
                return Err(StoreError::VersionMismatch { expected, actual });
            }
        }
        self.insert(tx.connection(), Some(stream.to_string()), payload)
            .await
    }
}

/// Schema the connection resolves unqualified names in.
async fn current_schema(conn: &mut AnyConnection, backend: &str) -> sqlx::Result<String> {
    if backend != POSTGRES {
        return Ok(SQLITE_DEFAULT_SCHEMA.to_string());
    }

    let schema = sqlx::query_scalar::<Any, Option<String>>("SELECT current_schema()::text")
        .fetch_one(conn)
        .await?;
    Ok(schema.unwrap_or_else(|| POSTGRES_DEFAULT_SCHEMA.to_string()))
}

/// A provider that cannot reach or prepare its table never becomes usable.
fn bootstrap_failed(lifecycle: &Lifecycle, error: sqlx::Error) -> StoreError {
    let reason = format!("bootstrap failed: {error}");
    lifecycle.mark_broken(reason.clone());
    StoreError::Broken(reason)
}

#[async_trait]
impl StoreProvider for SqlStoreProvider {
    async fn read_from(&self, offset: i64) -> Result<EventStream> {
        debug!(offset, "Reading events after offset");
        self.open_cursor(
            self.dialect.select_all_ordered_statement(),
            vec![Bind::Int(offset)],
        )
        .await
    }

    async fn read_by(&self, stream_id: Uuid) -> Result<EventStream> {
        debug!(stream = %stream_id, "Reading stream");
        self.open_cursor(
            self.dialect.select_by_stream_ordered_statement(),
            vec![Bind::Text(stream_id.to_string())],
        )
        .await
    }

    async fn read_by_skip(&self, stream_id: Uuid, skip: i64) -> Result<EventStream> {
        debug!(stream = %stream_id, skip, "Reading stream tail");
        self.open_cursor(
            self.dialect.select_by_stream_skip_statement(),
            vec![
                Bind::Text(stream_id.to_string()),
                Bind::Int(i64::MAX),
                Bind::Int(skip.max(0)),
            ],
        )
        .await
    }

    async fn stream_version(&self, stream_id: Uuid) -> Result<i64> {
        self.lifecycle.ensure_operational()?;
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| self.lifecycle.observe(e))?;
        self.version_on(&mut conn, &stream_id.to_string()).await
    }

    async fn write(&self, event: &Event) -> Result<()> {
        self.lifecycle.ensure_operational()?;
        let payload = self.serializer.serialize(event)?;

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| self.lifecycle.observe(e))?;

        let Some(stream_id) = event.stream_id() else {
            debug!("Writing event outside any stream");
            return self.insert(&mut conn, None, payload).await;
        };

        let stream = stream_id.to_string();
        let expected = event
            .requires_version_check()
            .then(|| event.expected_stream_version());

        let mut tx = WriteTransaction::begin(conn, self.dialect.as_ref(), &stream)
            .await
            .map_err(|e| self.lifecycle.observe(e))?;

        match self.append(&mut tx, &stream, expected, payload).await {
            Ok(()) => {
                tx.commit().await.map_err(|e| self.lifecycle.observe(e))?;
                debug!(stream = %stream, "Event written");
                Ok(())
            }
            Err(e) => {
                tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn delete_by(&self, stream_id: Uuid) -> Result<u64> {
        self.lifecycle.ensure_operational()?;

        let result = sqlx::query(self.dialect.delete_by_stream_statement())
            .bind(stream_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| self.lifecycle.observe(e))?;

        let deleted = result.rows_affected();
        warn!(stream = %stream_id, deleted, "Stream deleted");
        Ok(deleted)
    }
}
