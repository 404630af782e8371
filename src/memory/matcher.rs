//! Query evaluation for the in-memory store.

use crate::documents::{
    lookup, Cursor, Direction, DocumentPath, FieldOperator, Fields, Filter, Order,
};
use serde_json::Value;
use std::cmp::Ordering;

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: values of different types order by type
/// (null < bool < number < string < array < object), values of the same
/// type by content.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y) {
                let ord = compare_values(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn same_type(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b)
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    haystack.as_array().is_some_and(|items| {
        items
            .iter()
            .any(|item| compare_values(item, needle) == Ordering::Equal)
    })
}

pub(crate) fn matches(fields: &Fields, filter: &Filter) -> bool {
    let Some(actual) = lookup(fields, &filter.field) else {
        return false;
    };
    let expected = &filter.value;

    match filter.op {
        FieldOperator::Equal => compare_values(actual, expected) == Ordering::Equal,
        FieldOperator::NotEqual => {
            !actual.is_null() && compare_values(actual, expected) != Ordering::Equal
        }
        FieldOperator::LessThan => {
            same_type(actual, expected) && compare_values(actual, expected).is_lt()
        }
        FieldOperator::LessThanOrEqual => {
            same_type(actual, expected) && compare_values(actual, expected).is_le()
        }
        FieldOperator::GreaterThan => {
            same_type(actual, expected) && compare_values(actual, expected).is_gt()
        }
        FieldOperator::GreaterThanOrEqual => {
            same_type(actual, expected) && compare_values(actual, expected).is_ge()
        }
        FieldOperator::ArrayContains => contains(actual, expected),
        FieldOperator::In => contains(expected, actual),
        FieldOperator::ArrayContainsAny => expected
            .as_array()
            .is_some_and(|wanted| wanted.iter().any(|value| contains(actual, value))),
        FieldOperator::NotIn => !actual.is_null() && !contains(expected, actual),
    }
}

/// Sort key of a document under a query's ordering: the values of the field
/// orders followed by the document path. Documents missing an order-by field
/// have no key and are left out of ordered results.
pub(crate) struct SortKey<'a> {
    pub values: Vec<&'a Value>,
    pub path: &'a DocumentPath,
}

impl<'a> SortKey<'a> {
    pub fn of(orders: &[Order], path: &'a DocumentPath, fields: &'a Fields) -> Option<Self> {
        let values = orders
            .iter()
            .filter(|order| !order.is_document_name())
            .map(|order| lookup(fields, &order.field))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { values, path })
    }

    pub fn of_cursor(cursor: &'a Cursor) -> Self {
        Self {
            values: cursor.values().iter().collect(),
            path: cursor.document(),
        }
    }
}

pub(crate) fn compare_keys(orders: &[Order], a: &SortKey<'_>, b: &SortKey<'_>) -> Ordering {
    let mut values = a.values.iter().zip(&b.values);
    for order in orders {
        let ord = if order.is_document_name() {
            a.path.cmp(b.path)
        } else {
            match values.next() {
                Some((left, right)) => compare_values(left, right),
                None => Ordering::Equal,
            }
        };
        let ord = apply_direction(order.direction, ord);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    // the implicit path ordering follows the direction of the last explicit order
    let direction = orders.last().map(|o| o.direction).unwrap_or_default();
    apply_direction(direction, a.path.cmp(b.path))
}

fn apply_direction(direction: Direction, ord: Ordering) -> Ordering {
    match direction {
        Direction::Ascending => ord,
        Direction::Descending => ord.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DOCUMENT_NAME_FIELD;
    use serde_json::json;

    fn filter(field: &str, op: FieldOperator, value: Value) -> Filter {
        Filter {
            field: field.to_string(),
            op,
            value,
        }
    }

    #[test]
    fn test_cross_type_ordering() {
        let ordered = [
            json!(null),
            json!(false),
            json!(true),
            json!(-1),
            json!(2.5),
            json!("a"),
            json!([1]),
            json!({ "a": 1 }),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(compare_values(&pair[0], &pair[1]), Ordering::Less, "{:?}", pair);
        }
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Ordering::Equal);
    }

    #[test]
    fn test_filter_operators() {
        let fields = json!({
            "age": 36,
            "name": "Ada",
            "tags": ["math", "engines"],
            "nothing": null
        });
        let fields = fields.as_object().unwrap();

        assert!(matches(fields, &filter("age", FieldOperator::Equal, json!(36))));
        assert!(matches(fields, &filter("age", FieldOperator::GreaterThan, json!(18))));
        assert!(!matches(fields, &filter("age", FieldOperator::GreaterThan, json!("18"))));
        assert!(matches(fields, &filter("age", FieldOperator::LessThanOrEqual, json!(36))));
        assert!(matches(fields, &filter("name", FieldOperator::NotEqual, json!("Bob"))));
        assert!(!matches(fields, &filter("nothing", FieldOperator::NotEqual, json!("Bob"))));
        assert!(matches(fields, &filter("tags", FieldOperator::ArrayContains, json!("math"))));
        assert!(matches(fields, &filter("name", FieldOperator::In, json!(["Ada", "Bob"]))));
        assert!(matches(
            fields,
            &filter("tags", FieldOperator::ArrayContainsAny, json!(["art", "engines"]))
        ));
        assert!(!matches(fields, &filter("name", FieldOperator::NotIn, json!(["Ada"]))));
        assert!(!matches(fields, &filter("missing", FieldOperator::Equal, json!(1))));
    }

    #[test]
    fn test_descending_keys_break_ties_on_path() {
        let orders = vec![Order {
            field: "age".into(),
            direction: Direction::Descending,
        }];
        let a_path = DocumentPath::parse("users/a").unwrap();
        let b_path = DocumentPath::parse("users/b").unwrap();
        let a = json!({ "age": 30 });
        let b = json!({ "age": 30 });
        let a_key = SortKey::of(&orders, &a_path, a.as_object().unwrap()).unwrap();
        let b_key = SortKey::of(&orders, &b_path, b.as_object().unwrap()).unwrap();

        assert_eq!(compare_keys(&orders, &a_key, &b_key), Ordering::Greater);
    }

    #[test]
    fn test_document_name_order_uses_path() {
        let orders = vec![Order {
            field: DOCUMENT_NAME_FIELD.into(),
            direction: Direction::Descending,
        }];
        let a_path = DocumentPath::parse("users/a").unwrap();
        let b_path = DocumentPath::parse("users/b").unwrap();
        let empty = Fields::new();
        let a_key = SortKey::of(&orders, &a_path, &empty).unwrap();
        let b_key = SortKey::of(&orders, &b_path, &empty).unwrap();

        assert!(a_key.values.is_empty());
        assert_eq!(compare_keys(&orders, &a_key, &b_key), Ordering::Greater);
    }
}
