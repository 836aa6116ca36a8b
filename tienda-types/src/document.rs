//! Document store payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::ids::DocumentId;

/// The field map of a document.
pub type Fields = serde_json::Map<String, Value>;

/// A document read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Store identity of the document.
    pub id: DocumentId,
    /// The document's fields.
    pub fields: Fields,
}

impl Document {
    /// Create a document from an id and its fields.
    pub fn new(id: DocumentId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Look up a single field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up a string field, treating missing or non-string values as `None`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Flatten into a single JSON object with the id under `"id"`.
    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("id".into(), Value::String(self.id.to_string()));
        Value::Object(object)
    }
}

/// Sort direction of a live query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Smallest value first.
    #[serde(rename = "asc")]
    Ascending,
    /// Largest value first.
    #[serde(rename = "desc")]
    Descending,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => f.write_str("asc"),
            Self::Descending => f.write_str("desc"),
        }
    }
}

impl FromStr for OrderDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(ValidationError::InvalidField {
                field: "direction",
                reason: format!("unknown order direction {other:?}"),
            }),
        }
    }
}

/// A live query: every document of a collection ordered by one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Collection path, e.g. `"productos"`.
    pub collection: String,
    /// Field the results are ordered by.
    pub order_key: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl QuerySpec {
    /// Build a query spec.
    pub fn new(
        collection: impl Into<String>,
        order_key: impl Into<String>,
        direction: OrderDirection,
    ) -> Self {
        Self {
            collection: collection.into(),
            order_key: order_key.into(),
            direction,
        }
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} order by {} {}",
            self.collection, self.order_key, self.direction
        )
    }
}

/// The full ordered result set of a query at one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Store commit version this snapshot reflects. Strictly increasing
    /// across the snapshots of one registration.
    pub commit: u64,
    /// Documents in query order.
    pub documents: Vec<Document>,
}
