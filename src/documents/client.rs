use super::endpoint::{Endpoint, Operation, Target};
use super::path::DocumentPath;
use super::query::{next_cursor, Cursor, Query};
use super::record::{parse, Record};
use super::store::{DocumentStore, RawDocument};
use super::subscription::Subscription;
use super::{ServiceError, StoreError};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// One page of a collection read.
#[derive(Debug, Clone)]
pub struct Page<R> {
    pub records: Vec<R>,
    /// Where the next page starts; `None` once the results are exhausted.
    pub next_cursor: Option<Cursor>,
}

/// Typed client over a [`DocumentStore`] transport.
///
/// Cloning is cheap; clones share the transport and may issue requests
/// concurrently.
pub struct DocumentStoreClient<S> {
    store: Arc<S>,
}

impl<S> Clone for DocumentStoreClient<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> DocumentStoreClient<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn from_shared(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying transport.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reads the single document named by `endpoint` and decodes it.
    ///
    /// # Errors
    ///
    /// * `DocumentNotFound` if the path is a collection or query.
    /// * `InvalidRequest` for any operation other than `Get`.
    /// * `InvalidPath` if the path is malformed or the read fails.
    /// * `ParseError` if the document has no data or does not decode.
    pub async fn fetch_one<R, E>(&self, endpoint: &E) -> Result<R, ServiceError>
    where
        R: Record,
        E: Endpoint + ?Sized,
    {
        let path = resolve_document(endpoint)?;

        match endpoint.operation() {
            Operation::Get => {
                debug!(path = %path, "fetching document");
                let document = self
                    .store
                    .get_document(&path)
                    .await
                    .map_err(|e| ServiceError::InvalidPath(format!("{}: {}", path, e)))?;

                let fields = document.fields.ok_or_else(|| {
                    ServiceError::ParseError(format!("document {} has no data", path))
                })?;

                parse(fields)
            }
            other => Err(ServiceError::InvalidRequest(format!(
                "{} cannot return a single record",
                other.name()
            ))),
        }
    }

    /// Runs the collection or query named by `endpoint` and decodes every
    /// document, in store order.
    ///
    /// `page_size` bounds the number of documents read; `None` reads all.
    pub async fn fetch_many<R, E>(
        &self,
        endpoint: &E,
        page_size: Option<usize>,
    ) -> Result<Vec<R>, ServiceError>
    where
        R: Record,
        E: Endpoint + ?Sized,
    {
        let query = resolve_query(endpoint)?;
        let documents = read_documents(self.store.as_ref(), &query.page(page_size, None)).await?;
        decode_all(documents)
    }

    /// Reads one page of `page_size` documents starting after `after`.
    ///
    /// The returned page carries the cursor for the following page, or
    /// `None` if this page was short.
    pub async fn fetch_page<R, E>(
        &self,
        endpoint: &E,
        page_size: usize,
        after: Option<&Cursor>,
    ) -> Result<Page<R>, ServiceError>
    where
        R: Record,
        E: Endpoint + ?Sized,
    {
        let query = resolve_query(endpoint)?;
        let documents =
            read_documents(self.store.as_ref(), &query.page(Some(page_size), after)).await?;
        let next_cursor = next_cursor(&query, &documents, Some(page_size));
        Ok(Page {
            records: decode_all(documents)?,
            next_cursor,
        })
    }

    /// Creates a [`Paginator`] that walks the endpoint's results page by page.
    pub fn paginate<R, E>(
        &self,
        endpoint: &E,
        page_size: usize,
    ) -> Result<Paginator<S, R>, ServiceError>
    where
        R: Record,
        E: Endpoint + ?Sized,
    {
        Ok(Paginator {
            store: Arc::clone(&self.store),
            query: resolve_query(endpoint)?,
            page_size,
            cursor: None,
            _record: PhantomData,
        })
    }

    /// Applies a `Create`, `Replace` or `Delete` to a single document.
    ///
    /// `Create` stores the payload with its identifier set to the id of the
    /// target document. `Replace` only touches the given fields.
    pub async fn mutate<E>(&self, endpoint: &E) -> Result<(), ServiceError>
    where
        E: Endpoint + ?Sized,
    {
        let path = resolve_document(endpoint)?;

        let result = match endpoint.operation() {
            Operation::Get => {
                return Err(ServiceError::InvalidRequest(
                    "get is not a mutation".to_string(),
                ))
            }
            Operation::Create(payload) => {
                let fields = payload.fields_with_id(path.id())?;
                debug!(path = %path, "creating document");
                self.store.set_document(&path, fields).await
            }
            Operation::Replace(fields) => {
                debug!(path = %path, fields = fields.len(), "updating document");
                self.store.update_document(&path, fields).await
            }
            Operation::Delete => {
                debug!(path = %path, "deleting document");
                self.store.delete_document(&path).await
            }
        };

        result.map_err(|e| match e {
            StoreError::NotFound(msg) => ServiceError::DocumentNotFound(msg),
            other => ServiceError::Store(other),
        })
    }

    /// Opens a live subscription on the collection or query named by
    /// `endpoint`.
    ///
    /// Every change notification re-reads the (cursor-adjusted) query and
    /// yields the decoded batch. With a `page_size`, consecutive batches
    /// walk the results page by page and wrap around once exhausted.
    pub async fn subscribe<R, E>(
        &self,
        endpoint: &E,
        page_size: Option<usize>,
    ) -> Result<Subscription<R>, ServiceError>
    where
        R: Record,
        E: Endpoint + ?Sized,
    {
        let query = resolve_query(endpoint)?;
        let changes = self.store.subscribe(&query).await?;
        debug!(collection = query.collection(), ?page_size, "subscription opened");
        Ok(Subscription::new(
            Arc::clone(&self.store),
            query,
            page_size,
            changes,
        ))
    }
}

/// Walks a query page by page, owning its cursor.
pub struct Paginator<S, R> {
    store: Arc<S>,
    query: Query,
    page_size: usize,
    cursor: Option<Cursor>,
    _record: PhantomData<fn() -> R>,
}

impl<S: DocumentStore, R: Record> Paginator<S, R> {
    /// Reads the next page and moves the cursor.
    ///
    /// After a short page the cursor is cleared, so the following call
    /// starts from the beginning again. A page that fails to decode leaves
    /// the cursor where it was.
    pub async fn next_page(&mut self) -> Result<Vec<R>, ServiceError> {
        let query = self.query.page(Some(self.page_size), self.cursor.as_ref());
        let documents = read_documents(self.store.as_ref(), &query).await?;
        let cursor = next_cursor(&self.query, &documents, Some(self.page_size));
        let records = decode_all(documents)?;
        self.cursor = cursor;
        Ok(records)
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn reset(&mut self) {
        self.cursor = None;
    }
}

fn resolve_document<E: Endpoint + ?Sized>(endpoint: &E) -> Result<DocumentPath, ServiceError> {
    let reference = endpoint.path();
    match reference.resolve()? {
        Target::Document(path) => Ok(path),
        Target::Query(_) => Err(ServiceError::DocumentNotFound(format!(
            "{} is not a document",
            reference
        ))),
    }
}

fn resolve_query<E: Endpoint + ?Sized>(endpoint: &E) -> Result<Query, ServiceError> {
    let reference = endpoint.path();
    let query = match reference.resolve()? {
        Target::Query(query) => query,
        Target::Document(path) => {
            return Err(ServiceError::CollectionNotFound(format!(
                "{} is not a collection",
                path
            )))
        }
    };

    match endpoint.operation() {
        Operation::Get => Ok(query),
        other => Err(ServiceError::OperationNotSupported(format!(
            "{} on collection {}",
            other.name(),
            query.collection()
        ))),
    }
}

pub(crate) async fn read_documents<S: DocumentStore + ?Sized>(
    store: &S,
    query: &Query,
) -> Result<Vec<RawDocument>, ServiceError> {
    debug!(
        collection = query.collection(),
        limit = ?query.limit_value(),
        resumed = query.cursor().is_some(),
        "running query"
    );
    Ok(store.get_documents(query).await?)
}

pub(crate) fn decode_all<R: Record>(documents: Vec<RawDocument>) -> Result<Vec<R>, ServiceError> {
    documents
        .into_iter()
        .map(|document| {
            let fields = document.fields.ok_or_else(|| {
                ServiceError::ParseError(format!("document {} has no data", document.path))
            })?;
            parse(fields)
        })
        .collect()
}
