use super::*;
use crate::memory::MemoryStore;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct User {
    id: String,
    name: String,
}

impl Record for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

fn user(id: &str, name: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
    }
}

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

async fn seeded(users: &[(&str, &str)]) -> (MemoryStore, DocumentStoreClient<MemoryStore>) {
    let store = MemoryStore::new();
    for (id, name) in users {
        let path = DocumentPath::parse(&format!("users/{}", id)).unwrap();
        store
            .set_document(&path, fields(json!({ "id": id, "name": name })))
            .await
            .unwrap();
    }
    let client = DocumentStoreClient::new(store.clone());
    (store, client)
}

#[tokio::test]
async fn test_fetch_one_decodes_document() {
    let (_, client) = seeded(&[("42", "Ada")]).await;

    let fetched: User = client
        .fetch_one(&Request::get(PathReference::document("users/42")))
        .await
        .unwrap();
    assert_eq!(fetched, user("42", "Ada"));
}

#[tokio::test]
async fn test_fetch_one_missing_document_is_parse_error() {
    let (_, client) = seeded(&[]).await;

    let result = client
        .fetch_one::<User, _>(&Request::get(PathReference::document("users/404")))
        .await;
    assert!(matches!(result, Err(ServiceError::ParseError(_))));
}

#[tokio::test]
async fn test_fetch_one_transport_failure_is_invalid_path() {
    let (store, client) = seeded(&[("42", "Ada")]).await;
    store.set_offline(true);

    let result = client
        .fetch_one::<User, _>(&Request::get(PathReference::document("users/42")))
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidPath(_))));
}

#[tokio::test]
async fn test_fetch_one_shape_and_operation_checks() {
    let (_, client) = seeded(&[("42", "Ada")]).await;

    let collection = client
        .fetch_one::<User, _>(&Request::get(PathReference::collection("users")))
        .await;
    assert!(matches!(collection, Err(ServiceError::DocumentNotFound(_))));

    let delete = client.fetch_one::<User, _>(&Request::delete("users/42")).await;
    assert!(matches!(delete, Err(ServiceError::InvalidRequest(_))));

    let malformed = client
        .fetch_one::<User, _>(&Request::get(PathReference::document("users")))
        .await;
    assert!(matches!(malformed, Err(ServiceError::InvalidPath(_))));
}

#[tokio::test]
async fn test_fetch_many_preserves_store_order() {
    let (store, client) = seeded(&[("a", "Ada"), ("b", "Grace"), ("c", "Barbara")]).await;
    let path = DocumentPath::parse("users/b").unwrap();
    store
        .update_document(&path, fields(json!({ "rank": 1 })))
        .await
        .unwrap();

    let all: Vec<User> = client
        .fetch_many(&Request::get(PathReference::collection("users")), None)
        .await
        .unwrap();
    let ids: Vec<_> = all.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);

    let by_name = Query::new("users").order_by("name", Direction::Descending);
    let sorted: Vec<User> = client.fetch_many(&Request::get(by_name), Some(2)).await.unwrap();
    let names: Vec<_> = sorted.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["Grace", "Barbara"]);
}

#[tokio::test]
async fn test_fetch_many_with_filter() {
    let (_, client) = seeded(&[("a", "Ada"), ("b", "Grace")]).await;

    let query = Query::new("users")
        .where_filter("name", FieldOperator::Equal, "Grace")
        .unwrap();
    let found: Vec<User> = client.fetch_many(&Request::get(query), None).await.unwrap();
    assert_eq!(found, vec![user("b", "Grace")]);
}

#[tokio::test]
async fn test_fetch_many_shape_and_operation_checks() {
    let (_, client) = seeded(&[("42", "Ada")]).await;

    let document = client
        .fetch_many::<User, _>(&Request::get(PathReference::document("users/42")), None)
        .await;
    assert!(matches!(document, Err(ServiceError::CollectionNotFound(_))));

    let create = Request::new(
        PathReference::collection("users"),
        Operation::create(user("x", "Nobody")),
    );
    let result = client.fetch_many::<User, _>(&create, None).await;
    assert!(matches!(result, Err(ServiceError::OperationNotSupported(_))));
}

#[tokio::test]
async fn test_fetch_many_aborts_on_undecodable_document() {
    let (store, client) = seeded(&[("a", "Ada")]).await;
    let broken = DocumentPath::parse("users/b").unwrap();
    store
        .set_document(&broken, fields(json!({ "id": "b", "name": 7 })))
        .await
        .unwrap();

    let result = client
        .fetch_many::<User, _>(&Request::get(PathReference::collection("users")), None)
        .await;
    assert!(matches!(result, Err(ServiceError::ParseError(_))));
}

#[tokio::test]
async fn test_create_uses_document_id() {
    let (store, client) = seeded(&[]).await;

    client
        .mutate(&Request::create("users/42", user("caller-chosen", "Ada")))
        .await
        .unwrap();

    let stored = store.get("users/42").unwrap();
    assert_eq!(stored.get("id"), Some(&json!("42")));

    let fetched: User = client
        .fetch_one(&Request::get(PathReference::document("users/42")))
        .await
        .unwrap();
    assert_eq!(fetched.id(), "42");
}

#[tokio::test]
async fn test_replace_merges_named_fields() {
    let (store, client) = seeded(&[("42", "Ada")]).await;

    client
        .mutate(&Request::replace("users/42", fields(json!({ "name": "Ada Lovelace" }))))
        .await
        .unwrap();

    let stored = store.get("users/42").unwrap();
    assert_eq!(stored.get("id"), Some(&json!("42")));
    assert_eq!(stored.get("name"), Some(&json!("Ada Lovelace")));
}

#[tokio::test]
async fn test_replace_missing_document_reports_not_found() {
    let (_, client) = seeded(&[]).await;

    let result = client
        .mutate(&Request::replace("users/42", fields(json!({ "name": "Ada" }))))
        .await;
    assert!(matches!(result, Err(ServiceError::DocumentNotFound(_))));
}

#[tokio::test]
async fn test_delete_missing_document_succeeds() {
    let (store, client) = seeded(&[("1", "Ada")]).await;

    client.mutate(&Request::delete("users/42")).await.unwrap();
    client.mutate(&Request::delete("users/1")).await.unwrap();
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_mutate_shape_and_operation_checks() {
    let (store, client) = seeded(&[("42", "Ada")]).await;

    let get = client.mutate(&Request::get(PathReference::document("users/42"))).await;
    assert!(matches!(get, Err(ServiceError::InvalidRequest(_))));

    let collection = client
        .mutate(&Request::new(PathReference::collection("users"), Operation::Delete))
        .await;
    assert!(matches!(collection, Err(ServiceError::DocumentNotFound(_))));

    store.set_offline(true);
    let offline = client.mutate(&Request::delete("users/42")).await;
    assert!(matches!(offline, Err(ServiceError::Store(StoreError::Unavailable(_)))));
}

#[tokio::test]
async fn test_fetch_page_sets_cursor_on_full_page() {
    let (_, client) = seeded(&[("a", "Ada"), ("b", "Grace")]).await;
    let endpoint = Request::get(PathReference::collection("users"));

    let page: Page<User> = client.fetch_page(&endpoint, 2, None).await.unwrap();
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.next_cursor.unwrap().document().as_str(), "users/b");
}

#[tokio::test]
async fn test_fetch_page_clears_cursor_when_exhausted() {
    let (_, client) = seeded(&[("a", "Ada"), ("b", "Grace"), ("c", "Barbara")]).await;
    let endpoint = Request::get(PathReference::collection("users"));

    let first: Page<User> = client.fetch_page(&endpoint, 2, None).await.unwrap();
    let second: Page<User> = client
        .fetch_page(&endpoint, 2, first.next_cursor.as_ref())
        .await
        .unwrap();
    assert_eq!(second.records, vec![user("c", "Barbara")]);
    assert!(second.next_cursor.is_none());

    let empty = Request::get(PathReference::collection("teams"));
    let none: Page<User> = client.fetch_page(&empty, 2, None).await.unwrap();
    assert!(none.records.is_empty());
    assert!(none.next_cursor.is_none());
}

#[tokio::test]
async fn test_paginator_walks_and_wraps() {
    let (_, client) = seeded(&[("a", "Ada"), ("b", "Grace"), ("c", "Barbara")]).await;
    let mut pages = client
        .paginate::<User, _>(&Request::get(PathReference::collection("users")), 2)
        .unwrap();

    assert_eq!(pages.next_page().await.unwrap().len(), 2);
    assert_eq!(pages.cursor().unwrap().document().as_str(), "users/b");

    assert_eq!(pages.next_page().await.unwrap(), vec![user("c", "Barbara")]);
    assert!(pages.cursor().is_none());

    let again = pages.next_page().await.unwrap();
    assert_eq!(again[0].id, "a");

    pages.reset();
    assert!(pages.cursor().is_none());
}

#[tokio::test]
async fn test_paginator_respects_descending_order() {
    let (_, client) = seeded(&[("a", "Ada"), ("b", "Grace"), ("c", "Barbara")]).await;
    let query = Query::new("users").order_by("name", Direction::Descending);
    let mut pages = client.paginate::<User, _>(&Request::get(query), 1).unwrap();

    let mut names = Vec::new();
    for _ in 0..3 {
        names.extend(pages.next_page().await.unwrap().into_iter().map(|u| u.name));
    }
    assert_eq!(names, ["Grace", "Barbara", "Ada"]);
}

#[tokio::test]
async fn test_paginator_keeps_cursor_after_parse_error() {
    let (store, client) = seeded(&[("a", "Ada"), ("b", "Grace"), ("d", "Linus")]).await;
    let broken = DocumentPath::parse("users/c").unwrap();
    store
        .set_document(&broken, fields(json!({ "id": "c", "name": 7 })))
        .await
        .unwrap();
    let mut pages = client
        .paginate::<User, _>(&Request::get(PathReference::collection("users")), 2)
        .unwrap();

    assert_eq!(pages.next_page().await.unwrap().len(), 2);
    assert!(matches!(pages.next_page().await, Err(ServiceError::ParseError(_))));
    assert_eq!(pages.cursor().unwrap().document().as_str(), "users/b");

    store
        .set_document(&broken, fields(json!({ "id": "c", "name": "Barbara" })))
        .await
        .unwrap();
    let retried = pages.next_page().await.unwrap();
    assert_eq!(retried, vec![user("c", "Barbara"), user("d", "Linus")]);
}

#[tokio::test]
async fn test_fetch_many_orders_by_document_name() {
    let (_, client) = seeded(&[("a", "Ada"), ("b", "Grace"), ("c", "Barbara")]).await;

    let query = Query::new("users").order_by(DOCUMENT_NAME_FIELD, Direction::Descending);
    let all: Vec<User> = client.fetch_many(&Request::get(query.clone()), None).await.unwrap();
    let ids: Vec<_> = all.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, ["c", "b", "a"]);

    let mut pages = client.paginate::<User, _>(&Request::get(query), 2).unwrap();
    assert_eq!(pages.next_page().await.unwrap().len(), 2);
    assert_eq!(pages.next_page().await.unwrap(), vec![user("a", "Ada")]);
}

#[tokio::test]
async fn test_subscription_emits_batch_per_change() {
    let (_, client) = seeded(&[("a", "Ada")]).await;
    let mut subscription = client
        .subscribe::<User, _>(&Request::get(PathReference::collection("users")), None)
        .await
        .unwrap();

    let initial = subscription.next().await.unwrap().unwrap();
    assert_eq!(initial, vec![user("a", "Ada")]);

    client
        .mutate(&Request::create("users/b", user("", "Grace")))
        .await
        .unwrap();
    let updated = subscription.next().await.unwrap().unwrap();
    assert_eq!(updated, vec![user("a", "Ada"), user("b", "Grace")]);
}

#[tokio::test]
async fn test_subscription_ignores_other_collections() {
    let (_, client) = seeded(&[("a", "Ada")]).await;
    let mut subscription = client
        .subscribe::<User, _>(&Request::get(PathReference::collection("users")), None)
        .await
        .unwrap();
    subscription.next().await.unwrap().unwrap();

    client
        .mutate(&Request::create("teams/t", user("", "Team")))
        .await
        .unwrap();
    client
        .mutate(&Request::create("users/b", user("", "Grace")))
        .await
        .unwrap();

    let next = subscription.next().await.unwrap().unwrap();
    assert_eq!(next.len(), 2);
}

#[tokio::test]
async fn test_subscription_pages_with_private_cursor() {
    let (_, client) = seeded(&[("a", "Ada"), ("b", "Grace"), ("c", "Barbara")]).await;
    let endpoint = Request::get(PathReference::collection("users"));
    let mut first = client.subscribe::<User, _>(&endpoint, Some(2)).await.unwrap();
    let mut second = client.subscribe::<User, _>(&endpoint, Some(2)).await.unwrap();

    let page = first.next().await.unwrap().unwrap();
    assert_eq!(page, vec![user("a", "Ada"), user("b", "Grace")]);

    client
        .mutate(&Request::replace("users/a", fields(json!({ "name": "Ada L." }))))
        .await
        .unwrap();

    // full page moved the cursor past "b"
    let page = first.next().await.unwrap().unwrap();
    assert_eq!(page, vec![user("c", "Barbara")]);

    client
        .mutate(&Request::replace("users/c", fields(json!({ "name": "Barbara L." }))))
        .await
        .unwrap();

    // the short page cleared it again
    let page = first.next().await.unwrap().unwrap();
    assert_eq!(page[0], user("a", "Ada L."));

    // the other subscription has its own cursor and starts from the top
    let page = second.next().await.unwrap().unwrap();
    assert_eq!(page[0].id, "a");
    assert_eq!(page.len(), 2);
}

#[tokio::test]
async fn test_subscription_cancel_is_idempotent() {
    let (store, client) = seeded(&[("a", "Ada")]).await;
    let mut subscription = client
        .subscribe::<User, _>(&Request::get(PathReference::collection("users")), None)
        .await
        .unwrap();
    assert_eq!(store.listener_count(), 1);
    assert!(subscription.is_active());

    subscription.cancel();
    assert_eq!(store.listener_count(), 0);
    assert!(!subscription.is_active());

    subscription.cancel();
    assert_eq!(store.listener_count(), 0);
    assert!(subscription.next().await.is_none());
}

#[tokio::test]
async fn test_subscription_drop_removes_listener() {
    let (store, client) = seeded(&[]).await;
    {
        let _subscription = client
            .subscribe::<User, _>(&Request::get(PathReference::collection("users")), None)
            .await
            .unwrap();
        assert_eq!(store.listener_count(), 1);
    }
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn test_subscription_terminates_on_store_error() {
    let (store, client) = seeded(&[("a", "Ada")]).await;
    let mut subscription = client
        .subscribe::<User, _>(&Request::get(PathReference::collection("users")), None)
        .await
        .unwrap();
    subscription.next().await.unwrap().unwrap();

    store.disconnect_listeners("server going away");

    let error = subscription.next().await.unwrap();
    assert!(matches!(
        error,
        Err(ServiceError::Store(StoreError::ListenerClosed(reason))) if reason == "server going away"
    ));
    assert!(subscription.next().await.is_none());
    assert!(!subscription.is_active());
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn test_subscribe_rejects_document_paths() {
    let (store, client) = seeded(&[("a", "Ada")]).await;

    let result = client
        .subscribe::<User, _>(&Request::get(PathReference::document("users/a")), None)
        .await;
    assert!(matches!(result, Err(ServiceError::CollectionNotFound(_))));
    assert_eq!(store.listener_count(), 0);
}
