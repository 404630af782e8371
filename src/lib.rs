//! Typed document-store client.
//!
//! Describe a read or write as an [`Endpoint`](documents::Endpoint), then run
//! it through a [`DocumentStoreClient`](documents::DocumentStoreClient) to get
//! typed records back, page through collections with a cursor, or subscribe
//! to live updates. The store behind the client is pluggable: Cloud
//! Firestore ([`firestore`]) or an in-process [`memory`] store.

pub mod core;
pub mod documents;
pub mod memory;

#[cfg(feature = "firestore")]
pub mod firestore;

#[cfg(feature = "http")]
pub mod http;

pub use yup_oauth2::ServiceAccountKey;

#[cfg(feature = "firestore")]
use crate::core::middleware::AuthMiddleware;
#[cfg(feature = "firestore")]
use documents::DocumentStoreClient;
#[cfg(feature = "firestore")]
use firestore::FirestoreStore;

/// Entry point holding the service account credentials.
pub struct FuocoApp {
    key: ServiceAccountKey,
}

impl FuocoApp {
    pub fn new(service_account_key: ServiceAccountKey) -> Self {
        Self {
            key: service_account_key,
        }
    }

    /// The project the service account belongs to, if the key names one.
    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    /// A document client backed by the project's default Firestore database.
    #[cfg(feature = "firestore")]
    pub fn firestore(&self) -> DocumentStoreClient<FirestoreStore> {
        DocumentStoreClient::new(FirestoreStore::new(AuthMiddleware::new(self.key.clone())))
    }

    /// A document client for a Firestore-compatible endpoint such as the emulator.
    ///
    /// `base_url` must end in `/documents`.
    #[cfg(feature = "firestore")]
    pub fn firestore_with_url(
        &self,
        base_url: impl Into<String>,
    ) -> DocumentStoreClient<FirestoreStore> {
        DocumentStoreClient::new(FirestoreStore::new_with_url(
            AuthMiddleware::new(self.key.clone()),
            base_url.into(),
        ))
    }
}
