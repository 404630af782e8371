use super::path::{CollectionPath, DocumentPath};
use super::query::Query;
use super::record::{encode, Record};
use super::store::Fields;
use super::ServiceError;
use std::fmt;
use std::sync::Arc;

/// Where an endpoint points: one document, a whole collection, or a query.
#[derive(Debug, Clone, PartialEq)]
pub enum PathReference {
    Document(String),
    Collection(String),
    Query(Query),
}

impl PathReference {
    pub fn document(path: impl Into<String>) -> Self {
        Self::Document(path.into())
    }

    pub fn collection(path: impl Into<String>) -> Self {
        Self::Collection(path.into())
    }

    pub(crate) fn resolve(&self) -> Result<Target, ServiceError> {
        match self {
            Self::Document(path) => Ok(Target::Document(DocumentPath::parse(path)?)),
            Self::Collection(path) => {
                let collection = CollectionPath::parse(path)?;
                Ok(Target::Query(Query::new(collection.as_str())))
            }
            Self::Query(query) => {
                CollectionPath::parse(query.collection())?;
                Ok(Target::Query(query.clone()))
            }
        }
    }
}

impl From<Query> for PathReference {
    fn from(query: Query) -> Self {
        Self::Query(query)
    }
}

impl fmt::Display for PathReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document(path) | Self::Collection(path) => f.write_str(path),
            Self::Query(query) => f.write_str(query.collection()),
        }
    }
}

/// Resolved form of a `PathReference`.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    Document(DocumentPath),
    Query(Query),
}

trait EncodeWithId: Send + Sync {
    fn encode_with_id(&self, id: &str) -> Result<Fields, ServiceError>;
}

impl<R: Record + Clone> EncodeWithId for R {
    fn encode_with_id(&self, id: &str) -> Result<Fields, ServiceError> {
        let mut record = self.clone();
        record.set_id(id.to_string());
        encode(&record)
    }
}

/// A record to be created. Its identifier is replaced with the id of the
/// target document when the write happens.
#[derive(Clone)]
pub struct Payload(Arc<dyn EncodeWithId>);

impl Payload {
    pub fn new<R: Record + Clone>(record: R) -> Self {
        Self(Arc::new(record))
    }

    pub(crate) fn fields_with_id(&self, id: &str) -> Result<Fields, ServiceError> {
        self.0.encode_with_id(id)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Payload(..)")
    }
}

#[derive(Debug, Clone)]
pub enum Operation {
    Get,
    Create(Payload),
    /// Merge update of the named fields only.
    Replace(Fields),
    Delete,
}

impl Operation {
    pub fn create<R: Record + Clone>(record: R) -> Self {
        Self::Create(Payload::new(record))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Create(_) => "create",
            Self::Replace(_) => "replace",
            Self::Delete => "delete",
        }
    }
}

/// Declarative request descriptor, usually implemented by an application
/// enum of routes.
///
/// ```
/// use fuoco::documents::{Endpoint, Operation, PathReference};
///
/// enum UserEndpoint {
///     Profile(String),
///     Remove(String),
/// }
///
/// impl Endpoint for UserEndpoint {
///     fn path(&self) -> PathReference {
///         match self {
///             Self::Profile(id) | Self::Remove(id) => {
///                 PathReference::document(format!("users/{}", id))
///             }
///         }
///     }
///
///     fn operation(&self) -> Operation {
///         match self {
///             Self::Profile(_) => Operation::Get,
///             Self::Remove(_) => Operation::Delete,
///         }
///     }
/// }
/// ```
pub trait Endpoint {
    fn path(&self) -> PathReference;

    fn operation(&self) -> Operation {
        Operation::Get
    }
}

/// Ad-hoc endpoint built from a path and an operation.
#[derive(Debug, Clone)]
pub struct Request {
    pub path: PathReference,
    pub operation: Operation,
}

impl Request {
    pub fn new(path: impl Into<PathReference>, operation: Operation) -> Self {
        Self {
            path: path.into(),
            operation,
        }
    }

    pub fn get(path: impl Into<PathReference>) -> Self {
        Self::new(path, Operation::Get)
    }

    pub fn create<R: Record + Clone>(path: &str, record: R) -> Self {
        Self::new(PathReference::document(path), Operation::create(record))
    }

    pub fn replace(path: &str, fields: Fields) -> Self {
        Self::new(PathReference::document(path), Operation::Replace(fields))
    }

    pub fn delete(path: &str) -> Self {
        Self::new(PathReference::document(path), Operation::Delete)
    }
}

impl Endpoint for Request {
    fn path(&self) -> PathReference {
        self.path.clone()
    }

    fn operation(&self) -> Operation {
        self.operation.clone()
    }
}
