//! Provider lifecycle.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::error;

use super::{Result, StoreError};

/// Lifecycle of a store provider.
///
/// `Uninitialized -> Bootstrapped -> Operational -> Broken`. Broken is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StoreState {
    Uninitialized = 0,
    Bootstrapped = 1,
    Operational = 2,
    Broken = 3,
}

impl StoreState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => StoreState::Uninitialized,
            1 => StoreState::Bootstrapped,
            2 => StoreState::Operational,
            _ => StoreState::Broken,
        }
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreState::Uninitialized => "uninitialized",
            StoreState::Bootstrapped => "bootstrapped",
            StoreState::Operational => "operational",
            StoreState::Broken => "broken",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: AtomicU8,
    reason: OnceLock<String>,
}

/// Shared lifecycle handle.
///
/// Cloned into every cursor task so that a failure observed while streaming
/// breaks the provider that opened the stream.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StoreState {
        StoreState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Move forward to `next`. Never leaves `Broken`.
    pub(crate) fn advance(&self, next: StoreState) {
        let _ = self
            .inner
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < next as u8).then_some(next as u8)
            });
    }

    pub(crate) fn mark_broken(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.state() != StoreState::Broken {
            error!(reason = %reason, "Event store marked broken");
        }
        let _ = self.inner.reason.set(reason);
        self.advance(StoreState::Broken);
    }

    /// Fail fast unless the provider is operational.
    pub fn ensure_operational(&self) -> Result<()> {
        match self.state() {
            StoreState::Operational => Ok(()),
            StoreState::Broken => Err(StoreError::Broken(
                self.inner
                    .reason
                    .get()
                    .cloned()
                    .unwrap_or_else(|| "unrecoverable failure".to_string()),
            )),
            other => Err(StoreError::Broken(format!("store is {other}"))),
        }
    }

    /// Convert a database error, breaking the store when the error means the
    /// connection layer itself is gone.
    pub(crate) fn observe(&self, error: sqlx::Error) -> StoreError {
        if is_unrecoverable(&error) {
            self.mark_broken(error.to_string());
        }
        StoreError::Database(error)
    }
}

fn is_unrecoverable(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_moves_forward_only() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), StoreState::Uninitialized);

        lifecycle.advance(StoreState::Operational);
        lifecycle.advance(StoreState::Bootstrapped);
        assert_eq!(lifecycle.state(), StoreState::Operational);
        assert!(lifecycle.ensure_operational().is_ok());
    }

    #[test]
    fn test_not_yet_operational_fails_fast() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(StoreState::Bootstrapped);
        assert!(matches!(
            lifecycle.ensure_operational(),
            Err(StoreError::Broken(ref msg)) if msg.contains("bootstrapped")
        ));
    }

    #[test]
    fn test_io_failure_breaks_store() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(StoreState::Operational);

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = lifecycle.observe(sqlx::Error::Io(io));

        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(lifecycle.state(), StoreState::Broken);
        assert!(matches!(
            lifecycle.ensure_operational(),
            Err(StoreError::Broken(ref msg)) if msg.contains("reset by peer")
        ));
    }

    #[test]
    fn test_query_failure_keeps_store_operational() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(StoreState::Operational);

        let _ = lifecycle.observe(sqlx::Error::RowNotFound);
        assert_eq!(lifecycle.state(), StoreState::Operational);
    }

    #[test]
    fn test_broken_is_terminal() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(StoreState::Operational);
        lifecycle.mark_broken("pool closed");
        lifecycle.advance(StoreState::Operational);
        assert_eq!(lifecycle.state(), StoreState::Broken);
    }
}
