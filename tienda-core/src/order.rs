//! Query ordering.
//!
//! Values of different JSON types order by type first
//! (null < bool < number < string < array < object), then by value.
//! Documents that lack the order key are not part of the result set, and
//! ties are broken by document id in the query's direction.

use serde_json::Value;
use std::cmp::Ordering;
use tienda_types::{Document, OrderDirection, QuerySpec};

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

/// Total order over JSON field values.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(l, r))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()).then_with(|| {
            Value::Object(x.clone())
                .to_string()
                .cmp(&Value::Object(y.clone()).to_string())
        }),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Filter and sort `documents` the way the store answers `query`.
pub fn order_documents(documents: impl IntoIterator<Item = Document>, query: &QuerySpec) -> Vec<Document> {
    let mut matching: Vec<Document> = documents
        .into_iter()
        .filter(|doc| doc.fields.contains_key(&query.order_key))
        .collect();

    matching.sort_by(|a, b| {
        let key = &query.order_key;
        let ordering = match (a.fields.get(key), b.fields.get(key)) {
            (Some(x), Some(y)) => compare_values(x, y),
            _ => Ordering::Equal,
        }
        .then_with(|| a.id.cmp(&b.id));
        match query.direction {
            OrderDirection::Ascending => ordering,
            OrderDirection::Descending => ordering.reverse(),
        }
    });
    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tienda_types::{DocumentId, Fields};

    fn doc(id: &str, fields: Value) -> Document {
        let fields: Fields = match fields {
            Value::Object(map) => map,
            _ => panic!("fields must be an object"),
        };
        Document::new(DocumentId::new(id), fields)
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn types_order_before_values() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(true), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(100), &json!("1")), Ordering::Less);
        assert_eq!(compare_values(&json!("z"), &json!([])), Ordering::Less);
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
    }

    #[test]
    fn arrays_compare_elementwise() {
        assert_eq!(compare_values(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
        assert_eq!(compare_values(&json!([1]), &json!([1, 0])), Ordering::Less);
    }

    #[test]
    fn descending_order_by_timestamp() {
        let docs = vec![
            doc("a", json!({"creado": "2026-01-02T00:00:00.000Z"})),
            doc("b", json!({"creado": "2026-01-01T00:00:00.000Z"})),
            doc("c", json!({"creado": "2026-01-03T00:00:00.000Z"})),
        ];
        let query = QuerySpec::new("productos", "creado", OrderDirection::Descending);

        assert_eq!(ids(&order_documents(docs, &query)), vec!["c", "a", "b"]);
    }

    #[test]
    fn ties_break_by_document_id() {
        let docs = vec![
            doc("b", json!({"creado": "t"})),
            doc("a", json!({"creado": "t"})),
        ];
        let asc = QuerySpec::new("productos", "creado", OrderDirection::Ascending);
        let desc = QuerySpec::new("productos", "creado", OrderDirection::Descending);

        assert_eq!(ids(&order_documents(docs.clone(), &asc)), vec!["a", "b"]);
        assert_eq!(ids(&order_documents(docs, &desc)), vec!["b", "a"]);
    }

    #[test]
    fn documents_without_order_key_are_excluded() {
        let docs = vec![
            doc("a", json!({"creado": "t"})),
            doc("b", json!({"nombre": "sin fecha"})),
        ];
        let query = QuerySpec::new("productos", "creado", OrderDirection::Ascending);

        assert_eq!(ids(&order_documents(docs, &query)), vec!["a"]);
    }
}
