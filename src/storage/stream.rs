//! Lazy event streams.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

use super::Result;
use crate::event::RecordedEvent;

/// Forward-only, single-pass stream of recorded events.
///
/// A stream backed by a database cursor owns the connection and the task
/// driving the cursor. Both are released when the stream is exhausted, when
/// it yields an error, on [`close`](Self::close), or on drop.
pub struct EventStream {
    inner: BoxStream<'static, Result<RecordedEvent>>,
    task: Option<JoinHandle<()>>,
}

impl EventStream {
    /// Stream over events already in memory.
    pub fn from_events(events: Vec<RecordedEvent>) -> Self {
        Self {
            inner: stream::iter(events.into_iter().map(Ok)).boxed(),
            task: None,
        }
    }

    pub fn empty() -> Self {
        Self::from_events(Vec::new())
    }

    /// Stream fed by a producer task. The task stops once the receiver is
    /// gone.
    pub(crate) fn from_task(
        receiver: mpsc::Receiver<Result<RecordedEvent>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            inner: ReceiverStream::new(receiver).boxed(),
            task: Some(task),
        }
    }

    /// Stop reading and release the underlying connection.
    pub async fn close(mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();
        if let Err(e) = task.await {
            if e.is_panic() {
                error!(error = %e, "Event cursor task panicked");
            }
        }
    }

    /// Drain the stream, stopping at the first error.
    pub async fn try_collect(self) -> Result<Vec<RecordedEvent>> {
        futures::TryStreamExt::try_collect(self).await
    }
}

impl Stream for EventStream {
    type Item = Result<RecordedEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("cursor", &self.task.is_some())
            .finish()
    }
}
