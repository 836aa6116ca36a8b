//! Per-user profile documents (collection `users`, keyed by uid).

use chrono::Datelike;
use serde_json::Value;

use crate::document::{Document, Fields};
use crate::error::ValidationError;
use crate::ids::UserId;

/// Earliest graduation year accepted.
const MIN_GRADUATION_YEAR: i32 = 1950;
/// How many years into the future a graduation year may be.
const MAX_YEARS_AHEAD: i32 = 10;

/// A user's profile record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDocument {
    /// Owner of the profile; also the document id.
    pub uid: UserId,
    /// Full name.
    pub nombre: String,
    /// University degree.
    pub titulo_universitario: String,
    /// Graduation year, kept as entered.
    pub ano_graduacion: String,
    /// Account email.
    pub email: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: Option<String>,
    /// Last update timestamp (RFC 3339).
    pub updated_at: Option<String>,
}

impl ProfileDocument {
    /// The default profile written the first time a user's document is
    /// found missing.
    ///
    /// The payload only depends on `uid`, `email` and the timestamp, so a
    /// duplicate create from a concurrent caller writes an equivalent record.
    pub fn default_for(uid: UserId, email: &str, created_at: String) -> Self {
        Self {
            uid,
            nombre: String::new(),
            titulo_universitario: String::new(),
            ano_graduacion: String::new(),
            email: email.to_string(),
            created_at: Some(created_at),
            updated_at: None,
        }
    }

    /// Read a profile from a stored document. Missing fields read as empty.
    pub fn from_document(doc: &Document) -> Self {
        let text = |key: &str| doc.get_str(key).unwrap_or_default().to_string();
        Self {
            uid: UserId::new(doc.id.as_str()),
            nombre: text("nombre"),
            titulo_universitario: text("tituloUniversitario"),
            ano_graduacion: text("anoGraduacion"),
            email: text("email"),
            created_at: doc.get_str("createdAt").map(str::to_string),
            updated_at: doc.get_str("updatedAt").map(str::to_string),
        }
    }

    /// The stored field map (the uid is the document key, not a field).
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("nombre".into(), Value::String(self.nombre.clone()));
        fields.insert(
            "tituloUniversitario".into(),
            Value::String(self.titulo_universitario.clone()),
        );
        fields.insert(
            "anoGraduacion".into(),
            Value::String(self.ano_graduacion.clone()),
        );
        fields.insert("email".into(), Value::String(self.email.clone()));
        if let Some(created_at) = &self.created_at {
            fields.insert("createdAt".into(), Value::String(created_at.clone()));
        }
        if let Some(updated_at) = &self.updated_at {
            fields.insert("updatedAt".into(), Value::String(updated_at.clone()));
        }
        fields
    }

    /// Whether the user has filled in their details.
    pub fn is_complete(&self) -> bool {
        !self.nombre.is_empty()
            && !self.titulo_universitario.is_empty()
            && !self.ano_graduacion.is_empty()
    }
}

/// Editable profile fields submitted from the profile screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// Full name.
    pub nombre: String,
    /// University degree.
    pub titulo_universitario: String,
    /// Graduation year as typed.
    pub ano_graduacion: String,
}

impl ProfileUpdate {
    /// Validate against the current calendar year.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_for_year(chrono::Utc::now().year())
    }

    /// Validate against an explicit current year.
    pub fn validate_for_year(&self, current_year: i32) -> Result<(), ValidationError> {
        require("nombre", &self.nombre)?;
        require("tituloUniversitario", &self.titulo_universitario)?;
        require("anoGraduacion", &self.ano_graduacion)?;
        validate_graduation_year(&self.ano_graduacion, current_year)?;
        Ok(())
    }

    /// Fields written by a partial update, stamped with `updated_at`.
    pub fn to_fields(&self, updated_at: String) -> Fields {
        let mut fields = Fields::new();
        fields.insert("nombre".into(), Value::String(self.nombre.clone()));
        fields.insert(
            "tituloUniversitario".into(),
            Value::String(self.titulo_universitario.clone()),
        );
        fields.insert(
            "anoGraduacion".into(),
            Value::String(self.ano_graduacion.clone()),
        );
        fields.insert("updatedAt".into(), Value::String(updated_at));
        fields
    }
}

/// Check a graduation year is a number in `1950..=current_year + 10`.
pub fn validate_graduation_year(value: &str, current_year: i32) -> Result<i32, ValidationError> {
    let year: i32 = value
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidGraduationYear(value.to_string()))?;
    if !(MIN_GRADUATION_YEAR..=current_year + MAX_YEARS_AHEAD).contains(&year) {
        return Err(ValidationError::InvalidGraduationYear(value.to_string()));
    }
    Ok(year)
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::DocumentId;
    use serde_json::json;

    fn update(nombre: &str, titulo: &str, ano: &str) -> ProfileUpdate {
        ProfileUpdate {
            nombre: nombre.into(),
            titulo_universitario: titulo.into(),
            ano_graduacion: ano.into(),
        }
    }

    #[test]
    fn default_profile_has_empty_fields_and_email() {
        let profile =
            ProfileDocument::default_for(UserId::new("u1"), "ana@example.com", "t0".into());
        let fields = profile.to_fields();

        assert_eq!(fields.get("nombre"), Some(&json!("")));
        assert_eq!(fields.get("tituloUniversitario"), Some(&json!("")));
        assert_eq!(fields.get("anoGraduacion"), Some(&json!("")));
        assert_eq!(fields.get("email"), Some(&json!("ana@example.com")));
        assert_eq!(fields.get("createdAt"), Some(&json!("t0")));
        assert!(fields.get("updatedAt").is_none());
        assert!(!profile.is_complete());
    }

    #[test]
    fn from_document_tolerates_missing_fields() {
        let mut fields = Fields::new();
        fields.insert("nombre".into(), json!("Ana"));
        let doc = Document::new(DocumentId::new("u1"), fields);

        let profile = ProfileDocument::from_document(&doc);
        assert_eq!(profile.uid, UserId::new("u1"));
        assert_eq!(profile.nombre, "Ana");
        assert_eq!(profile.titulo_universitario, "");
        assert!(profile.created_at.is_none());
    }

    #[test]
    fn fields_survive_a_store_round_trip() {
        let profile = ProfileDocument {
            uid: UserId::new("u1"),
            nombre: "Ana".into(),
            titulo_universitario: "Ingeniera".into(),
            ano_graduacion: "2020".into(),
            email: "ana@example.com".into(),
            created_at: Some("t0".into()),
            updated_at: Some("t1".into()),
        };
        let doc = Document::new(DocumentId::new("u1"), profile.to_fields());
        assert_eq!(ProfileDocument::from_document(&doc), profile);
    }

    #[test]
    fn update_requires_every_field() {
        assert_eq!(
            update("", "Ing", "2020").validate_for_year(2026),
            Err(ValidationError::MissingField("nombre"))
        );
        assert_eq!(
            update("Ana", "  ", "2020").validate_for_year(2026),
            Err(ValidationError::MissingField("tituloUniversitario"))
        );
    }

    #[test]
    fn graduation_year_window() {
        assert!(update("Ana", "Ing", "1950").validate_for_year(2026).is_ok());
        assert!(update("Ana", "Ing", "2036").validate_for_year(2026).is_ok());
        assert!(update("Ana", "Ing", "1949").validate_for_year(2026).is_err());
        assert!(update("Ana", "Ing", "2037").validate_for_year(2026).is_err());
        assert!(update("Ana", "Ing", "20x0").validate_for_year(2026).is_err());
    }

    #[test]
    fn update_fields_carry_timestamp() {
        let fields = update("Ana", "Ing", "2020").to_fields("t2".into());
        assert_eq!(fields.get("updatedAt"), Some(&json!("t2")));
        assert!(fields.get("email").is_none());
    }
}
