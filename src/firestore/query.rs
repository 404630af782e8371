use super::convert::json_to_value;
use super::models::{
    CollectionSelector, CompositeFilter, CompositeOperator, Cursor, FieldFilter, FieldReference,
    Order, QueryFilter, StructuredQuery, Value, ValueType,
};
use crate::documents::{CollectionPath, Direction, Query, StoreError, DOCUMENT_NAME_FIELD};

/// Translates a `Query` into Firestore's `StructuredQuery`.
///
/// `database` is the database resource name
/// (`projects/{p}/databases/{d}`), used to build the document reference of
/// a cursor.
pub(crate) fn structured_query(
    query: &Query,
    database: &str,
) -> Result<StructuredQuery, StoreError> {
    let collection = CollectionPath::parse(query.collection())
        .map_err(|e| StoreError::ApiError(e.to_string()))?;

    let mut filters = query
        .filters()
        .iter()
        .map(|filter| {
            Ok(QueryFilter::FieldFilter(FieldFilter {
                field: FieldReference {
                    field_path: filter.field.clone(),
                },
                op: filter.op,
                value: json_to_value(filter.value.clone())?,
            }))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    let where_clause = match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(QueryFilter::CompositeFilter(CompositeFilter {
            op: CompositeOperator::And,
            filters,
        })),
    };

    let mut order_by: Vec<Order> = query
        .orders()
        .iter()
        .map(|order| Order {
            field: FieldReference {
                field_path: order.field.clone(),
            },
            direction: order.direction,
        })
        .collect();

    let orders_by_name = query.orders().iter().any(|o| o.is_document_name());

    // pages are only stable with the document name as a sort key
    if !orders_by_name {
        let direction = order_by
            .last()
            .map(|o| o.direction)
            .unwrap_or(Direction::Ascending);
        order_by.push(Order {
            field: FieldReference {
                field_path: DOCUMENT_NAME_FIELD.to_string(),
            },
            direction,
        });
    }

    let start_at = match query.cursor() {
        Some(cursor) => {
            let reference = || Value {
                value_type: ValueType::ReferenceValue(format!(
                    "{}/documents/{}",
                    database,
                    cursor.document()
                )),
            };

            // one value per orderBy entry, the reference standing in for name orders
            let mut field_values = cursor.values().iter().cloned();
            let mut values = Vec::with_capacity(order_by.len());
            for order in query.orders() {
                if order.is_document_name() {
                    values.push(reference());
                } else if let Some(value) = field_values.next() {
                    values.push(json_to_value(value)?);
                }
            }
            if !orders_by_name {
                values.push(reference());
            }

            Some(Cursor {
                values,
                before: false,
            })
        }
        None => None,
    };

    Ok(StructuredQuery {
        from: vec![CollectionSelector {
            collection_id: collection.id().to_string(),
        }],
        where_clause,
        order_by,
        start_at,
        limit: query
            .limit_value()
            .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX)),
    })
}
