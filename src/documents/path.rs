use super::ServiceError;
use std::fmt;

fn segments(path: &str) -> Result<Vec<&str>, ServiceError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidPath(path.to_string()));
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.iter().any(|s| s.is_empty()) {
        return Err(ServiceError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Slash-separated path to a single document, e.g. `users/42`.
///
/// Always has an even number of segments.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn parse(path: &str) -> Result<Self, ServiceError> {
        let parts = segments(path)?;
        if parts.len() % 2 != 0 {
            return Err(ServiceError::InvalidPath(path.to_string()));
        }
        Ok(Self(parts.join("/")))
    }

    /// The document identifier: the last path segment.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Path of the collection that contains this document.
    pub fn parent(&self) -> CollectionPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => CollectionPath(parent.to_string()),
            None => CollectionPath(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Slash-separated path to a collection, e.g. `users` or `users/42/posts`.
///
/// Always has an odd number of segments.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn parse(path: &str) -> Result<Self, ServiceError> {
        let parts = segments(path)?;
        if parts.len() % 2 != 1 {
            return Err(ServiceError::InvalidPath(path.to_string()));
        }
        Ok(Self(parts.join("/")))
    }

    /// The collection identifier: the last path segment.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Path of the owning document for subcollections, `None` for root collections.
    pub fn parent(&self) -> Option<DocumentPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| DocumentPath(parent.to_string()))
    }

    /// Returns the path of the document `id` inside this collection.
    pub fn doc(&self, id: &str) -> Result<DocumentPath, ServiceError> {
        DocumentPath::parse(&format!("{}/{}", self.0, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
