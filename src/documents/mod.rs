//! Typed access to a path-addressed document store.
//!
//! Callers describe what they want with an [`Endpoint`] (a [`PathReference`]
//! plus an [`Operation`]); [`DocumentStoreClient`] resolves it, runs it
//! against a [`DocumentStore`] transport and decodes the raw field maps into
//! [`Record`] types.
//!
//! # Pagination
//!
//! Collection reads can be bounded by a page size. [`Paginator`] and
//! [`Subscription`] keep a private [`Cursor`] that moves to the last
//! document of every full page and is cleared by a short or empty page.
//!
//! # Live updates
//!
//! [`DocumentStoreClient::subscribe`] returns a stream that re-reads the
//! query on every change notification and yields one decoded batch per
//! notification.
//!
//! # Decoding
//!
//! Decoding is all or nothing per call: if any document of a batch fails to
//! decode, the whole batch fails with [`ServiceError::ParseError`].

mod client;
mod endpoint;
mod path;
mod query;
mod record;
mod store;
mod subscription;

#[cfg(test)]
mod tests;

pub use self::client::{DocumentStoreClient, Page, Paginator};
pub use self::endpoint::{Endpoint, Operation, PathReference, Payload, Request};
pub use self::path::{CollectionPath, DocumentPath};
pub use self::query::{
    lookup, Cursor, Direction, FieldOperator, Filter, Order, Query, DOCUMENT_NAME_FIELD,
};
pub use self::record::{encode, parse, Record};
pub use self::store::{ChangeEvent, ChangeStream, DocumentStore, Fields, RawDocument};
pub use self::subscription::Subscription;

use thiserror::Error;

/// Errors returned to callers of [`DocumentStoreClient`].
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The call needs a single document but the path names something else,
    /// or the store reported the document missing.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    /// The call needs a collection or query but the path names a document.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The path is malformed or the document could not be read.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    /// The operation does not match the call (e.g. `get` passed to `mutate`).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// A document body is missing or does not match the record type.
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Mutations against collections or queries.
    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),
    /// The transport failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by [`DocumentStore`] transports.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the backing service.
    #[error("API error: {0}")]
    ApiError(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// The document a write required does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// A live listener was closed by the store.
    #[error("Listener closed: {0}")]
    ListenerClosed(String),
}
