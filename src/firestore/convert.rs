//! Conversion between Firestore's typed values and plain JSON field maps.

use super::models::{ArrayValue, MapValue, Value, ValueType};
use crate::documents::{Fields, StoreError};
use serde::de::Error;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

fn invalid(message: String) -> StoreError {
    StoreError::SerializationError(<serde_json::Error as Error>::custom(message))
}

pub(crate) fn fields_to_json(fields: HashMap<String, Value>) -> Result<Fields, StoreError> {
    fields
        .into_iter()
        .map(|(key, value)| Ok((key, value_to_json(value)?)))
        .collect()
}

pub(crate) fn value_to_json(value: Value) -> Result<JsonValue, StoreError> {
    Ok(match value.value_type {
        ValueType::StringValue(s) => JsonValue::String(s),
        ValueType::IntegerValue(s) => {
            let i: i64 = s
                .parse()
                .map_err(|e| invalid(format!("Failed to parse integer string '{}': {}", s, e)))?;
            JsonValue::Number(i.into())
        }
        ValueType::DoubleValue(d) => JsonValue::Number(
            serde_json::Number::from_f64(d)
                .ok_or_else(|| invalid(format!("Invalid f64 value: {}", d)))?,
        ),
        ValueType::BooleanValue(b) => JsonValue::Bool(b),
        ValueType::MapValue(map_value) => JsonValue::Object(fields_to_json(map_value.fields)?),
        ValueType::ArrayValue(array_value) => JsonValue::Array(
            array_value
                .values
                .into_iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        ValueType::NullValue(_) => JsonValue::Null,
        ValueType::TimestampValue(s) => JsonValue::String(s),
        ValueType::GeoPointValue(gp) => {
            serde_json::json!({ "latitude": gp.latitude, "longitude": gp.longitude })
        }
        ValueType::BytesValue(s) => JsonValue::String(s),
        ValueType::ReferenceValue(s) => JsonValue::String(s),
    })
}

pub(crate) fn json_to_fields(fields: Fields) -> Result<HashMap<String, Value>, StoreError> {
    fields
        .into_iter()
        .map(|(key, value)| Ok((key, json_to_value(value)?)))
        .collect()
}

pub(crate) fn json_to_value(value: JsonValue) -> Result<Value, StoreError> {
    let value_type = match value {
        JsonValue::Null => ValueType::NullValue(()),
        JsonValue::Bool(b) => ValueType::BooleanValue(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                ValueType::IntegerValue(i.to_string())
            } else if let Some(f) = n.as_f64() {
                ValueType::DoubleValue(f)
            } else {
                return Err(invalid(format!("Unsupported number type: {}", n)));
            }
        }
        JsonValue::String(s) => ValueType::StringValue(s),
        JsonValue::Array(a) => ValueType::ArrayValue(ArrayValue {
            values: a
                .into_iter()
                .map(json_to_value)
                .collect::<Result<Vec<_>, _>>()?,
        }),
        JsonValue::Object(o) => ValueType::MapValue(MapValue {
            fields: json_to_fields(o)?,
        }),
    };
    Ok(Value { value_type })
}
