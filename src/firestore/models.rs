use crate::documents::{Direction, FieldOperator};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    #[serde(flatten)]
    pub value_type: ValueType,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    StringValue(String),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    BooleanValue(bool),
    MapValue(MapValue),
    ArrayValue(ArrayValue),
    NullValue(()),
    TimestampValue(String),
    GeoPointValue(GeoPoint),
    BytesValue(String), // base64 encoded
    ReferenceValue(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct MapValue {
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WriteBody {
    pub fields: HashMap<String, Value>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    pub document: Option<Document>,
    pub read_time: Option<String>,
}

#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<QueryFilter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<Cursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub enum QueryFilter {
    FieldFilter(FieldFilter),
    CompositeFilter(CompositeFilter),
}

#[derive(Serialize, Debug, Clone)]
pub struct FieldFilter {
    pub field: FieldReference,
    pub op: FieldOperator,
    pub value: Value,
}

#[derive(Serialize, Debug, Clone)]
pub struct CompositeFilter {
    pub op: CompositeOperator,
    pub filters: Vec<QueryFilter>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompositeOperator {
    And,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct Order {
    pub field: FieldReference,
    pub direction: Direction,
}

#[derive(Serialize, Debug, Clone)]
pub struct Cursor {
    pub values: Vec<Value>,
    pub before: bool,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListenRequest {
    pub database: String,
    pub add_target: Target,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub query: QueryTarget,
    pub target_id: i32,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QueryTarget {
    pub parent: String,
    pub structured_query: StructuredQuery,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListenResponse {
    pub target_change: Option<TargetChange>,
    pub document_change: Option<DocumentChange>,
    pub document_delete: Option<DocumentDelete>,
    pub document_remove: Option<DocumentRemove>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TargetChange {
    pub target_change_type: Option<TargetChangeType>,
    pub cause: Option<Status>,
    pub read_time: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetChangeType {
    NoChange,
    Add,
    Remove,
    Current,
    Reset,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChange {
    pub document: Document,
    #[serde(default)]
    pub target_ids: Vec<i32>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DocumentDelete {
    pub document: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DocumentRemove {
    pub document: String,
}
