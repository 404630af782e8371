use super::path::DocumentPath;
use super::query::Query;
use super::StoreError;
use futures::stream::Stream;
use std::pin::Pin;

/// Loosely typed field map as held by the store.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// One document as returned by a transport, before decoding.
///
/// `fields` is `None` when the document does not exist or has no body.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub path: DocumentPath,
    pub fields: Option<Fields>,
}

impl RawDocument {
    pub fn id(&self) -> &str {
        self.path.id()
    }
}

/// A store-side change observed by a live registration.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// The result set is current; emitted once right after registration.
    Snapshot,
    DocumentChanged(DocumentPath),
    DocumentRemoved(DocumentPath),
}

/// Live change notifications for one registration.
///
/// Dropping the stream removes the registration.
pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<ChangeEvent, StoreError>> + Send>>;

/// Transport to a hierarchical, path-addressed document store.
///
/// Implementations do all I/O; `DocumentStoreClient` layers endpoint
/// resolution, decoding and pagination on top.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Reads one document. A missing document is not an error.
    async fn get_document(&self, path: &DocumentPath) -> Result<RawDocument, StoreError>;

    /// Runs a query and returns matching documents in store order.
    async fn get_documents(&self, query: &Query) -> Result<Vec<RawDocument>, StoreError>;

    /// Writes the whole document, replacing any previous content.
    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError>;

    /// Updates only the named fields of an existing document.
    async fn update_document(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError>;

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), StoreError>;

    /// Registers a live listener on the query's result set.
    async fn subscribe(&self, query: &Query) -> Result<ChangeStream, StoreError>;
}
