use super::store::Fields;
use super::ServiceError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A typed unit of stored data with a store-assigned identifier.
///
/// ```
/// use fuoco::documents::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Clone)]
/// struct User {
///     id: String,
///     name: String,
/// }
///
/// impl Record for User {
///     fn id(&self) -> &str {
///         &self.id
///     }
///
///     fn set_id(&mut self, id: String) {
///         self.id = id;
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

/// Decodes a field map into `T` through a JSON value.
///
/// All or nothing: a missing field or a type mismatch fails the whole record.
pub fn parse<T: DeserializeOwned>(fields: Fields) -> Result<T, ServiceError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| ServiceError::ParseError(e.to_string()))
}

/// Encodes `value` as a field map. Only values that serialize to a JSON
/// object can be stored as documents.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Fields, ServiceError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ServiceError::ParseError(format!(
            "can only store objects as documents, got {}",
            other
        ))),
        Err(e) => Err(ServiceError::ParseError(e.to_string())),
    }
}
