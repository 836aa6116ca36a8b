//! Inventory records (collection `productos`).

use serde_json::{json, Value};

use crate::document::{Document, Fields};
use crate::error::ValidationError;
use crate::ids::DocumentId;
use crate::profile::require;

/// A stored inventory item.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Store-assigned id.
    pub id: DocumentId,
    /// Display name.
    pub nombre: String,
    /// Price, non-negative.
    pub precio: f64,
    /// Whether the item has been sold.
    pub vendido: bool,
    /// Creation timestamp (RFC 3339); live lists order by it.
    pub creado: String,
}

impl Product {
    /// Read a product from a stored document.
    ///
    /// Missing or mistyped fields fall back to empty/zero/false.
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            nombre: doc.get_str("nombre").unwrap_or_default().to_string(),
            precio: doc.get("precio").and_then(Value::as_f64).unwrap_or(0.0),
            vendido: doc.get("vendido").and_then(Value::as_bool).unwrap_or(false),
            creado: doc.get_str("creado").unwrap_or_default().to_string(),
        }
    }
}

/// A product as typed into the add-product form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    /// Name as typed.
    pub nombre: String,
    /// Price as typed.
    pub precio: String,
}

impl NewProduct {
    /// Create form input.
    pub fn new(nombre: impl Into<String>, precio: impl Into<String>) -> Self {
        Self {
            nombre: nombre.into(),
            precio: precio.into(),
        }
    }

    /// Validate and convert into the stored field map.
    ///
    /// The name is trimmed, the price must parse as a non-negative number,
    /// and new items start unsold.
    pub fn into_fields(self, creado: String) -> Result<Fields, ValidationError> {
        require("nombre", &self.nombre)?;
        require("precio", &self.precio)?;
        let precio: f64 = self
            .precio
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidPrice(self.precio.clone()))?;
        if !precio.is_finite() || precio < 0.0 {
            return Err(ValidationError::InvalidPrice(self.precio));
        }

        let mut fields = Fields::new();
        fields.insert("nombre".into(), json!(self.nombre.trim()));
        fields.insert("precio".into(), json!(precio));
        fields.insert("vendido".into(), json!(false));
        fields.insert("creado".into(), json!(creado));
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_product_trims_name_and_parses_price() {
        let fields = NewProduct::new("  Laptop Dell ", "1200.50")
            .into_fields("t0".into())
            .unwrap();

        assert_eq!(fields.get("nombre"), Some(&json!("Laptop Dell")));
        assert_eq!(fields.get("precio"), Some(&json!(1200.5)));
        assert_eq!(fields.get("vendido"), Some(&json!(false)));
        assert_eq!(fields.get("creado"), Some(&json!("t0")));
    }

    #[test]
    fn new_product_rejects_blank_name() {
        let err = NewProduct::new("   ", "10").into_fields("t0".into()).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("nombre"));
    }

    #[test]
    fn new_product_rejects_bad_prices() {
        for precio in ["abc", "-1", "NaN", "inf"] {
            let err = NewProduct::new("Mouse", precio)
                .into_fields("t0".into())
                .unwrap_err();
            assert!(
                matches!(err, ValidationError::InvalidPrice(_)),
                "{precio} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn product_reads_stored_fields() {
        let fields = NewProduct::new("Mouse", "15").into_fields("t0".into()).unwrap();
        let product = Product::from_document(&Document::new(DocumentId::new("p1"), fields));

        assert_eq!(product.id, DocumentId::new("p1"));
        assert_eq!(product.nombre, "Mouse");
        assert_eq!(product.precio, 15.0);
        assert!(!product.vendido);
        assert_eq!(product.creado, "t0");
    }
}
