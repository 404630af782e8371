//! In-process [`DocumentStore`] for tests, prototyping and offline use.
//!
//! Documents live in an ordered map keyed by path. Every write notifies
//! live listeners of the document's collection.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use fuoco::documents::{DocumentStoreClient, Request};
//! # use fuoco::memory::MemoryStore;
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let client = DocumentStoreClient::new(store.clone());
//! client.mutate(&Request::delete("users/42")).await?;
//! assert!(store.is_empty());
//! # Ok(())
//! # }
//! ```

mod matcher;

use crate::documents::{
    ChangeEvent, ChangeStream, CollectionPath, DocumentPath, DocumentStore, Fields, Query,
    RawDocument, StoreError,
};
use futures::stream::{self, StreamExt};
use matcher::{compare_keys, matches, SortKey};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace};

const SIGNAL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
enum Signal {
    Change(ChangeEvent),
    Disconnect(String),
}

/// Decrements the live-listener count when a change stream is dropped.
struct ListenerGuard(Arc<AtomicUsize>);

impl ListenerGuard {
    fn register(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
        trace!("memory listener removed");
    }
}

/// Document store held entirely in memory. Clones share the same data.
#[derive(Clone)]
pub struct MemoryStore {
    documents: Arc<RwLock<BTreeMap<DocumentPath, Fields>>>,
    signals: broadcast::Sender<Signal>,
    listeners: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            documents: Arc::new(RwLock::new(BTreeMap::new())),
            signals,
            listeners: Arc::new(AtomicUsize::new(0)),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`
    /// until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fails every live change stream with `StoreError::ListenerClosed`.
    pub fn disconnect_listeners(&self, reason: &str) {
        let _ = self.signals.send(Signal::Disconnect(reason.to_string()));
    }

    /// Number of live change-stream registrations.
    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }

    /// Current content of a document, if it exists.
    ///
    /// Unlike the [`DocumentStore`] methods, which fail with
    /// `StoreError::Unavailable`, this reads through a poisoned lock.
    pub fn get(&self, path: &str) -> Option<Fields> {
        let path = DocumentPath::parse(path).ok()?;
        self.snapshot().get(&path).cloned()
    }

    /// Number of stored documents, read through a poisoned lock like [`get`](Self::get).
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn notify(&self, event: ChangeEvent) {
        // no receivers is fine
        let _ = self.signals.send(Signal::Change(event));
    }

    fn snapshot(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<DocumentPath, Fields>> {
        self.documents.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<DocumentPath, Fields>>, StoreError> {
        self.documents
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<DocumentPath, Fields>>, StoreError> {
        self.documents
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))
    }
}

fn collection_of(query: &Query) -> Result<CollectionPath, StoreError> {
    CollectionPath::parse(query.collection()).map_err(|e| StoreError::ApiError(e.to_string()))
}

fn affects(event: &ChangeEvent, collection: &CollectionPath) -> bool {
    match event {
        ChangeEvent::Snapshot => true,
        ChangeEvent::DocumentChanged(path) | ChangeEvent::DocumentRemoved(path) => {
            path.parent() == *collection
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, path: &DocumentPath) -> Result<RawDocument, StoreError> {
        self.ensure_online()?;
        let fields = self.read()?.get(path).cloned();
        Ok(RawDocument {
            path: path.clone(),
            fields,
        })
    }

    async fn get_documents(&self, query: &Query) -> Result<Vec<RawDocument>, StoreError> {
        self.ensure_online()?;
        let collection = collection_of(query)?;
        let orders = query.orders();
        let documents = self.read()?;

        let mut selected: Vec<(SortKey<'_>, &Fields)> = documents
            .iter()
            .filter(|(path, _)| path.parent() == collection)
            .filter(|(_, fields)| query.filters().iter().all(|f| matches(fields, f)))
            .filter_map(|(path, fields)| SortKey::of(orders, path, fields).map(|key| (key, fields)))
            .collect();

        selected.sort_by(|(a, _), (b, _)| compare_keys(orders, a, b));

        let results = match query.cursor() {
            Some(cursor) => {
                let start = SortKey::of_cursor(cursor);
                selected
                    .into_iter()
                    .filter(|(key, _)| compare_keys(orders, key, &start).is_gt())
                    .collect::<Vec<_>>()
            }
            None => selected,
        };

        let page = results
            .into_iter()
            .take(query.limit_value().unwrap_or(usize::MAX))
            .map(|(key, fields)| RawDocument {
                path: key.path.clone(),
                fields: Some(fields.clone()),
            })
            .collect();
        Ok(page)
    }

    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.write()?.insert(path.clone(), fields);
        self.notify(ChangeEvent::DocumentChanged(path.clone()));
        Ok(())
    }

    async fn update_document(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
        self.ensure_online()?;
        {
            let mut documents = self.write()?;
            let existing = documents
                .get_mut(path)
                .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }
        self.notify(ChangeEvent::DocumentChanged(path.clone()));
        Ok(())
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), StoreError> {
        self.ensure_online()?;
        let removed = self.write()?.remove(path).is_some();
        if removed {
            self.notify(ChangeEvent::DocumentRemoved(path.clone()));
        }
        Ok(())
    }

    async fn subscribe(&self, query: &Query) -> Result<ChangeStream, StoreError> {
        self.ensure_online()?;
        let collection = collection_of(query)?;
        let receiver = self.signals.subscribe();
        let guard = ListenerGuard::register(&self.listeners);
        debug!(collection = %collection, "memory listener registered");

        let initial = stream::once(async { Ok(ChangeEvent::Snapshot) });
        let updates = stream::unfold(Some((receiver, guard)), move |state| {
            let collection = collection.clone();
            async move {
                let (mut receiver, guard) = state?;
                loop {
                    match receiver.recv().await {
                        Ok(Signal::Change(event)) => {
                            if affects(&event, &collection) {
                                return Some((Ok(event), Some((receiver, guard))));
                            }
                        }
                        Ok(Signal::Disconnect(reason)) => {
                            return Some((Err(StoreError::ListenerClosed(reason)), None));
                        }
                        // missed notifications collapse into one full re-read
                        Err(RecvError::Lagged(_)) => {
                            return Some((Ok(ChangeEvent::Snapshot), Some((receiver, guard))));
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(initial.chain(updates).boxed())
    }
}
