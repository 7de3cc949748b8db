//! Streaming cursor over query results.
//!
//! The cursor runs in its own task which owns the pooled connection and
//! pushes decoded rows through a channel of capacity one, so at most one
//! row is materialized ahead of the consumer.

use std::sync::Arc;

use futures::StreamExt;
use sqlx::any::AnyRow;
use sqlx::pool::PoolConnection;
use sqlx::{Any, Row};
use tokio::sync::mpsc;
use tracing::debug;

use crate::event::RecordedEvent;
use crate::serializer::{EventSerializer, Payload, PayloadType};
use crate::storage::{EventStream, Lifecycle, Result};

/// Positional parameter value.
#[derive(Debug, Clone)]
pub(super) enum Bind {
    Int(i64),
    Text(String),
}

/// Everything a cursor task needs to decode rows.
#[derive(Clone)]
pub(super) struct RowDecoder {
    pub serializer: Arc<dyn EventSerializer>,
    pub offset_column: &'static str,
    pub payload_column: &'static str,
    pub lifecycle: Lifecycle,
}

impl RowDecoder {
    fn decode(&self, row: &AnyRow) -> Result<RecordedEvent> {
        let offset: i64 = row
            .try_get(self.offset_column)
            .map_err(|e| self.lifecycle.observe(e))?;

        let payload = match self.serializer.payload_type() {
            PayloadType::Text => Payload::Text(
                row.try_get(self.payload_column)
                    .map_err(|e| self.lifecycle.observe(e))?,
            ),
            PayloadType::Binary => Payload::Binary(
                row.try_get(self.payload_column)
                    .map_err(|e| self.lifecycle.observe(e))?,
            ),
        };

        let event = self.serializer.deserialize(payload)?;
        Ok(RecordedEvent { offset, event })
    }
}

/// Run `sql` on `conn` in a background task and stream the decoded rows.
///
/// The task ends, releasing the connection, after the last row, after the
/// first error, or as soon as the consumer goes away.
pub(super) fn spawn(
    mut conn: PoolConnection<Any>,
    sql: String,
    binds: Vec<Bind>,
    decoder: RowDecoder,
) -> EventStream {
    let (tx, rx) = mpsc::channel(1);

    let task = tokio::spawn(async move {
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = match bind {
                Bind::Int(value) => query.bind(value),
                Bind::Text(value) => query.bind(value),
            };
        }

        let mut rows = query.fetch(&mut *conn);
        let mut delivered = 0u64;

        while let Some(row) = rows.next().await {
            let item = row
                .map_err(|e| decoder.lifecycle.observe(e))
                .and_then(|row| decoder.decode(&row));
            let failed = item.is_err();

            if tx.send(item).await.is_err() {
                debug!(delivered, "Event stream consumer gone; stopping cursor");
                return;
            }
            if failed {
                return;
            }
            delivered += 1;
        }

        debug!(delivered, "Event cursor exhausted");
    });

    EventStream::from_task(rx, task)
}
