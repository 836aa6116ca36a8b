//! Sign-in and registration input.

use std::fmt;

use crate::error::ValidationError;
use crate::ids::UserId;
use crate::profile::{require, validate_graduation_year, ProfileDocument};

/// Shortest password the identity provider accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Email and password for sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Build credentials.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Both fields must be present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("email", &self.email)?;
        require("password", &self.password)?;
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// The registration form.
#[derive(Clone, PartialEq, Eq)]
pub struct Registration {
    /// Full name.
    pub nombre: String,
    /// Account email.
    pub email: String,
    /// Chosen password.
    pub password: String,
    /// Password confirmation.
    pub confirm_password: String,
    /// University degree.
    pub titulo_universitario: String,
    /// Graduation year as typed.
    pub ano_graduacion: String,
}

impl Registration {
    /// Validate the whole form against an explicit current year.
    pub fn validate_for_year(&self, current_year: i32) -> Result<(), ValidationError> {
        require("nombre", &self.nombre)?;
        require("email", &self.email)?;
        require("password", &self.password)?;
        require("confirmPassword", &self.confirm_password)?;
        require("tituloUniversitario", &self.titulo_universitario)?;
        require("anoGraduacion", &self.ano_graduacion)?;
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        validate_graduation_year(&self.ano_graduacion, current_year)?;
        Ok(())
    }

    /// Validate against the current calendar year.
    pub fn validate(&self) -> Result<(), ValidationError> {
        use chrono::Datelike;
        self.validate_for_year(chrono::Utc::now().year())
    }

    /// Credentials to hand to the identity provider.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.email.clone(), self.password.clone())
    }

    /// The full profile written right after the account is created.
    pub fn profile(&self, uid: UserId, created_at: String) -> ProfileDocument {
        ProfileDocument {
            uid,
            nombre: self.nombre.clone(),
            titulo_universitario: self.titulo_universitario.clone(),
            ano_graduacion: self.ano_graduacion.clone(),
            email: self.email.clone(),
            created_at: Some(created_at),
            updated_at: None,
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("nombre", &self.nombre)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("titulo_universitario", &self.titulo_universitario)
            .field("ano_graduacion", &self.ano_graduacion)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> Registration {
        Registration {
            nombre: "Ana".into(),
            email: "ana@example.com".into(),
            password: "secreto".into(),
            confirm_password: "secreto".into(),
            titulo_universitario: "Ingeniera".into(),
            ano_graduacion: "2020".into(),
        }
    }

    #[test]
    fn valid_form_passes() {
        assert!(form().validate_for_year(2026).is_ok());
    }

    #[test]
    fn mismatched_passwords_rejected() {
        let mut f = form();
        f.confirm_password = "otro123".into();
        assert_eq!(f.validate_for_year(2026), Err(ValidationError::PasswordMismatch));
    }

    #[test]
    fn short_password_rejected() {
        let mut f = form();
        f.password = "abc".into();
        f.confirm_password = "abc".into();
        assert_eq!(
            f.validate_for_year(2026),
            Err(ValidationError::PasswordTooShort { min: 6 })
        );
    }

    #[test]
    fn registration_profile_copies_form() {
        let profile = form().profile(UserId::new("u1"), "t0".into());
        assert_eq!(profile.nombre, "Ana");
        assert_eq!(profile.email, "ana@example.com");
        assert!(profile.is_complete());
    }

    #[test]
    fn debug_redacts_passwords() {
        let debug = format!("{:?} {:?}", form(), form().credentials());
        assert!(!debug.contains("secreto"), "password leaked: {debug}");
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn empty_credentials_rejected() {
        assert_eq!(
            Credentials::new("", "x").validate(),
            Err(ValidationError::MissingField("email"))
        );
    }
}
