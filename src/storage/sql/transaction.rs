//! Per-stream write transactions.

use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection};
use tracing::{error, warn};

use crate::storage::Dialect;

/// Open write transaction serializing writers of one stream.
///
/// Must end with [`commit`](Self::commit) or [`rollback`](Self::rollback).
/// A transaction dropped while still open (cancelled future, failed commit)
/// closes its connection instead of returning it to the pool, which makes
/// the server discard the transaction.
pub(super) struct WriteTransaction {
    conn: PoolConnection<Any>,
    open: bool,
}

impl WriteTransaction {
    pub(super) async fn begin(
        conn: PoolConnection<Any>,
        dialect: &dyn Dialect,
        stream_id: &str,
    ) -> Result<Self, sqlx::Error> {
        // Guarded before BEGIN is sent; a cancelled or failed begin closes the
        // connection.
        let mut tx = Self { conn, open: true };

        sqlx::query(dialect.begin_write_statement())
            .execute(&mut *tx.conn)
            .await?;

        if let Some(lock) = dialect.stream_lock_statement() {
            sqlx::query(lock)
                .bind(stream_id.to_string())
                .fetch_optional(&mut *tx.conn)
                .await?;
        }

        Ok(tx)
    }

    pub(super) fn connection(&mut self) -> &mut AnyConnection {
        &mut self.conn
    }

    pub(super) async fn commit(mut self) -> Result<(), sqlx::Error> {
        sqlx::query("COMMIT").execute(&mut *self.conn).await?;
        self.open = false;
        Ok(())
    }

    /// Roll back. Failures are logged; the caller's error is what matters.
    pub(super) async fn rollback(mut self) {
        match sqlx::query("ROLLBACK").execute(&mut *self.conn).await {
            Ok(_) => self.open = false,
            Err(e) => error!(error = %e, "Failed to roll back write transaction"),
        }
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if self.open {
            warn!("Write transaction dropped while open; closing its connection");
            self.conn.close_on_drop();
        }
    }
}
