use super::client::{decode_all, read_documents};
use super::query::{next_cursor, Cursor, Query};
use super::record::Record;
use super::store::{ChangeStream, DocumentStore};
use super::ServiceError;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, trace};

/// State owned by one live subscription. Only the subscription's own
/// stream ever touches the cursor, one change notification at a time.
struct ListenState<S, R> {
    store: Arc<S>,
    query: Query,
    page_size: Option<usize>,
    cursor: Option<Cursor>,
    changes: ChangeStream,
    _record: PhantomData<fn() -> R>,
}

impl<S: DocumentStore, R: Record> ListenState<S, R> {
    async fn read_batch(&mut self) -> Result<Vec<R>, ServiceError> {
        let query = self.query.page(self.page_size, self.cursor.as_ref());
        let documents = read_documents(self.store.as_ref(), &query).await?;
        let cursor = next_cursor(&self.query, &documents, self.page_size);
        let batch = decode_all(documents)?;
        self.cursor = cursor;
        Ok(batch)
    }
}

/// A live, cancelable stream of decoded result batches.
///
/// Yields one batch per store change notification. The stream ends after
/// the first error, after the store closes the registration, or once
/// [`cancel`](Self::cancel) is called. Dropping the subscription cancels it.
pub struct Subscription<R> {
    inner: Option<BoxStream<'static, Result<Vec<R>, ServiceError>>>,
}

impl<R: Record> Subscription<R> {
    pub(crate) fn new<S: DocumentStore>(
        store: Arc<S>,
        query: Query,
        page_size: Option<usize>,
        changes: ChangeStream,
    ) -> Self {
        let state = ListenState::<S, R> {
            store,
            query,
            page_size,
            cursor: None,
            changes,
            _record: PhantomData,
        };

        let inner = stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            match state.changes.next().await? {
                Ok(event) => {
                    trace!(?event, collection = state.query.collection(), "change notification");
                    match state.read_batch().await {
                        Ok(batch) => Some((Ok(batch), Some(state))),
                        Err(e) => Some((Err(e), None)),
                    }
                }
                Err(e) => Some((Err(ServiceError::Store(e)), None)),
            }
        })
        .boxed();

        Self { inner: Some(inner) }
    }
}

impl<R> Subscription<R> {
    /// Removes the store registration and ends the stream.
    ///
    /// Calling it again is a no-op.
    pub fn cancel(&mut self) {
        if self.inner.take().is_some() {
            debug!("subscription cancelled");
        }
    }

    /// `false` once the subscription has been cancelled or has ended.
    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }
}

impl<R> Stream for Subscription<R> {
    type Item = Result<Vec<R>, ServiceError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        let poll = inner.poll_next_unpin(cx);
        if let Poll::Ready(None) = poll {
            this.inner = None;
        }
        poll
    }
}
