use super::path::DocumentPath;
use super::store::{Fields, RawDocument};
use super::ServiceError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison applied by a field filter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldOperator {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Equal,
    NotEqual,
    ArrayContains,
    In,
    ArrayContainsAny,
    NotIn,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FieldOperator,
    pub value: Value,
}

/// Field path that orders by the document path itself.
pub const DOCUMENT_NAME_FIELD: &str = "__name__";

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

impl Order {
    /// `true` when this orders by document path rather than a stored field.
    pub fn is_document_name(&self) -> bool {
        self.field == DOCUMENT_NAME_FIELD
    }
}

/// Position just after the last document of an observed page.
///
/// Holds the values of the query's ordering fields for that document plus
/// its path, which together identify a unique position in the result set.
/// Orders on [`DOCUMENT_NAME_FIELD`] have no stored value; the path covers them.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    values: Vec<Value>,
    document: DocumentPath,
}

impl Cursor {
    pub(crate) fn after(query: &Query, document: &RawDocument) -> Self {
        let values = query
            .orders
            .iter()
            .filter(|order| !order.is_document_name())
            .map(|order| {
                document
                    .fields
                    .as_ref()
                    .and_then(|fields| lookup(fields, &order.field))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect();

        Self {
            values,
            document: document.path.clone(),
        }
    }

    /// Values of the ordering fields, one per field `Order` of the query.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The document the cursor points after.
    pub fn document(&self) -> &DocumentPath {
        &self.document
    }
}

/// Resolves a dotted field path (`address.city`) inside a field map.
pub fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// A filtered, ordered view of one collection.
///
/// ```
/// use fuoco::documents::{Direction, FieldOperator, Query};
///
/// let query = Query::new("users")
///     .where_filter("age", FieldOperator::GreaterThanOrEqual, 18)
///     .unwrap()
///     .order_by("age", Direction::Descending)
///     .limit(10);
/// assert_eq!(query.collection(), "users");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    filters: Vec<Filter>,
    orders: Vec<Order>,
    limit: Option<usize>,
    start_after: Option<Cursor>,
}

impl Query {
    /// Creates a query over every document of `collection`.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            orders: Vec::new(),
            limit: None,
            start_after: None,
        }
    }

    /// Adds a filter. Filters are combined with AND.
    pub fn where_filter<T: Serialize>(
        mut self,
        field: &str,
        op: FieldOperator,
        value: T,
    ) -> Result<Self, ServiceError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ServiceError::ParseError(format!("filter value for '{}': {}", field, e)))?;
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value,
        });
        Ok(self)
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.orders.push(Order {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resumes the query after the position recorded by `cursor`.
    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.start_after = Some(cursor);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.start_after.as_ref()
    }

    /// Narrows the query to one page: `page_size` replaces any limit, and
    /// `cursor` replaces any start position.
    pub(crate) fn page(&self, page_size: Option<usize>, cursor: Option<&Cursor>) -> Self {
        let mut query = self.clone();
        if page_size.is_some() {
            query.limit = page_size;
        }
        if let Some(cursor) = cursor {
            query.start_after = Some(cursor.clone());
        }
        query
    }
}

/// Cursor policy applied after every page.
///
/// A page that filled `page_size` may have a successor, so the cursor moves
/// to its last document. A short or empty page means the results are
/// exhausted and the cursor is cleared. Unbounded reads never keep a cursor.
pub(crate) fn next_cursor(
    query: &Query,
    batch: &[RawDocument],
    page_size: Option<usize>,
) -> Option<Cursor> {
    match (batch.last(), page_size) {
        (Some(last), Some(size)) if batch.len() >= size => Some(Cursor::after(query, last)),
        _ => None,
    }
}
