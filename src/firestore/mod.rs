//! Cloud Firestore transport.
//!
//! [`FirestoreStore`] implements [`DocumentStore`] over the Firestore REST
//! API (v1), so a [`DocumentStoreClient`](crate::documents::DocumentStoreClient)
//! can read, write and listen to a Firestore database.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use fuoco::FuocoApp;
//! # use fuoco::documents::{PathReference, Request};
//! # #[derive(serde::Serialize, serde::Deserialize, Clone)]
//! # struct User { id: String, name: String }
//! # impl fuoco::documents::Record for User {
//! #     fn id(&self) -> &str { &self.id }
//! #     fn set_id(&mut self, id: String) { self.id = id; }
//! # }
//! # async fn run(app: FuocoApp) -> Result<(), Box<dyn std::error::Error>> {
//! let firestore = app.firestore();
//! let user: User = firestore
//!     .fetch_one(&Request::get(PathReference::document("users/42")))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod listen;
pub mod models;

mod convert;
mod query;


use self::convert::{fields_to_json, json_to_fields};
use self::listen::ListenStream;
use self::models::{
    Document, ListenRequest, ListenResponse, QueryTarget, RunQueryRequest, RunQueryResponse,
    Target, TargetChangeType, WriteBody,
};
use self::query::structured_query;
use crate::core::middleware::AuthMiddleware;
use crate::core::parse_error_response;
use crate::documents::{
    ChangeEvent, ChangeStream, CollectionPath, DocumentPath, DocumentStore, Fields, Query,
    RawDocument, StoreError,
};
use futures::{future, StreamExt};
use reqwest::{header, Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use tracing::{debug, trace};
use url::Url;

const FIRESTORE_V1_API: &str =
    "https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents";

const MAX_RETRIES: u32 = 3;

const LISTEN_TARGET_ID: i32 = 1;

/// Firestore REST transport.
#[derive(Clone)]
pub struct FirestoreStore {
    client: ClientWithMiddleware,
    base_url: String,
}

impl FirestoreStore {
    /// Creates a transport for the default database of the service account's project.
    ///
    /// This is typically called via `FuocoApp::firestore()`.
    pub fn new(middleware: AuthMiddleware) -> Self {
        let project_id = middleware.project_id().unwrap_or_default().to_string();
        let base_url = FIRESTORE_V1_API.replace("{project_id}", &project_id);
        Self::new_with_url(middleware, base_url)
    }

    /// Creates a transport with a custom base URL, ending in `/documents`
    /// (useful for the emulator).
    pub fn new_with_url(middleware: AuthMiddleware, base_url: String) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES);

        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(middleware)
            .build();

        Self { client, base_url }
    }

    #[cfg(test)]
    pub(crate) fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// The database resource name, `projects/{p}/databases/{d}`.
    fn database_name(&self) -> Result<String, StoreError> {
        match self.base_url.find("projects/") {
            Some(start) => Ok(self.base_url[start..]
                .trim_end_matches('/')
                .trim_end_matches("/documents")
                .to_string()),
            None => Err(StoreError::ApiError(format!(
                "Invalid base_url: {}",
                self.base_url
            ))),
        }
    }

    fn document_url(&self, path: &DocumentPath) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// URL of the resource that owns `collection`: the database root for
    /// top-level collections, the parent document otherwise.
    fn parent_url(&self, collection: &CollectionPath) -> String {
        match collection.parent() {
            Some(parent) => self.document_url(&parent),
            None => self.base_url.clone(),
        }
    }

    fn parent_name(&self, collection: &CollectionPath) -> Result<String, StoreError> {
        let database = self.database_name()?;
        Ok(match collection.parent() {
            Some(parent) => format!("{}/documents/{}", database, parent),
            None => format!("{}/documents", database),
        })
    }

    async fn write(&self, url: Url, fields: Fields, action: &str) -> Result<(), StoreError> {
        let body = WriteBody {
            fields: json_to_fields(fields)?,
        };

        let response = self
            .client
            .patch(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&body)?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(
                parse_error_response(response, action).await,
            ));
        }

        if !response.status().is_success() {
            return Err(StoreError::ApiError(
                parse_error_response(response, action).await,
            ));
        }

        Ok(())
    }
}

fn parse_url(url: &str) -> Result<Url, StoreError> {
    Url::parse(url).map_err(|e| StoreError::ApiError(format!("Invalid URL {}: {}", url, e)))
}

/// Path of a document relative to the database, from its resource name.
fn relative_path(name: &str) -> Result<DocumentPath, StoreError> {
    let relative = name
        .split_once("/documents/")
        .map(|(_, path)| path)
        .ok_or_else(|| StoreError::ApiError(format!("Unexpected document name: {}", name)))?;
    DocumentPath::parse(relative).map_err(|e| StoreError::ApiError(e.to_string()))
}

fn raw_document(document: Document) -> Result<RawDocument, StoreError> {
    Ok(RawDocument {
        path: relative_path(&document.name)?,
        fields: Some(fields_to_json(document.fields)?),
    })
}

/// Turns the listen messages of one target into change notifications.
///
/// Document changes streamed while the target is loading (before the first
/// `CURRENT`, or after a `RESET`) describe the initial result set, so they
/// are folded into the single `Snapshot` emitted on `CURRENT`.
#[derive(Debug, Default)]
struct TargetTracker {
    current: bool,
}

impl TargetTracker {
    fn apply(&mut self, response: ListenResponse) -> Option<Result<ChangeEvent, StoreError>> {
        if let Some(change) = response.target_change {
            return match change.target_change_type {
                Some(TargetChangeType::Current) if !self.current => {
                    self.current = true;
                    Some(Ok(ChangeEvent::Snapshot))
                }
                Some(TargetChangeType::Reset) => {
                    self.current = false;
                    None
                }
                Some(TargetChangeType::Remove) => {
                    let reason = change
                        .cause
                        .map(|status| format!("{} (code: {})", status.message, status.code))
                        .unwrap_or_else(|| "target removed".to_string());
                    Some(Err(StoreError::ListenerClosed(reason)))
                }
                _ => None,
            };
        }

        if !self.current {
            return None;
        }

        if let Some(change) = response.document_change {
            return Some(relative_path(&change.document.name).map(ChangeEvent::DocumentChanged));
        }
        if let Some(delete) = response.document_delete {
            return Some(relative_path(&delete.document).map(ChangeEvent::DocumentRemoved));
        }
        if let Some(remove) = response.document_remove {
            return Some(relative_path(&remove.document).map(ChangeEvent::DocumentRemoved));
        }
        None
    }
}

#[async_trait::async_trait]
impl DocumentStore for FirestoreStore {
    async fn get_document(&self, path: &DocumentPath) -> Result<RawDocument, StoreError> {
        let response = self.client.get(self.document_url(path)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(RawDocument {
                path: path.clone(),
                fields: None,
            });
        }

        if !response.status().is_success() {
            return Err(StoreError::ApiError(
                parse_error_response(response, "Get document failed").await,
            ));
        }

        let document: Document = response.json().await?;
        Ok(RawDocument {
            path: path.clone(),
            fields: Some(fields_to_json(document.fields)?),
        })
    }

    async fn get_documents(&self, query: &Query) -> Result<Vec<RawDocument>, StoreError> {
        let collection = CollectionPath::parse(query.collection())
            .map_err(|e| StoreError::ApiError(e.to_string()))?;
        let url = format!("{}:runQuery", self.parent_url(&collection));

        let request = RunQueryRequest {
            structured_query: structured_query(query, &self.database_name()?)?,
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::ApiError(
                parse_error_response(response, "Run query failed").await,
            ));
        }

        let responses: Vec<RunQueryResponse> = response.json().await?;
        responses
            .into_iter()
            .filter_map(|res| res.document)
            .map(raw_document)
            .collect()
    }

    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
        let url = parse_url(&self.document_url(path))?;
        self.write(url, fields, "Set document failed").await
    }

    async fn update_document(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
        let mut url = parse_url(&self.document_url(path))?;
        {
            let mut pairs = url.query_pairs_mut();
            for field in fields.keys() {
                pairs.append_pair("updateMask.fieldPaths", field);
            }
            pairs.append_pair("currentDocument.exists", "true");
        }
        self.write(url, fields, "Update document failed").await
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), StoreError> {
        let response = self.client.delete(self.document_url(path)).send().await?;

        if !response.status().is_success() {
            return Err(StoreError::ApiError(
                parse_error_response(response, "Delete document failed").await,
            ));
        }

        Ok(())
    }

    async fn subscribe(&self, query: &Query) -> Result<ChangeStream, StoreError> {
        let collection = CollectionPath::parse(query.collection())
            .map_err(|e| StoreError::ApiError(e.to_string()))?;
        let database = self.database_name()?;

        let request = ListenRequest {
            add_target: Target {
                query: QueryTarget {
                    parent: self.parent_name(&collection)?,
                    structured_query: structured_query(query, &database)?,
                },
                target_id: LISTEN_TARGET_ID,
            },
            database,
        };

        let response = self
            .client
            .post(format!("{}:listen", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::ApiError(
                parse_error_response(response, "Listen failed").await,
            ));
        }

        debug!(collection = %collection, "firestore listener registered");

        let mut tracker = TargetTracker::default();
        let changes = ListenStream::from_response(response).filter_map(move |message| {
            let event = match message {
                Ok(response) => {
                    trace!(?response, "listen message");
                    tracker.apply(response)
                }
                Err(e) => Some(Err(e)),
            };
            future::ready(event)
        });

        Ok(changes.boxed())
    }
}
