//! Request form validation.
//!
//! Every form deserializes into a struct of `Option<String>` fields so that a
//! missing field and an unknown field name both surface as "required" errors
//! rather than as extractor rejections. `validate` is pure: it never touches
//! the database, the caller persists the cleaned value.

pub mod account;
pub mod photo;

use std::collections::BTreeMap;

pub use account::{LoginForm, PasswordChangeForm, ProfileEditForm, SignupForm};
pub use photo::{AddPhotoForm, CommentCreationForm, EditPhotoForm, UploadedFile};

pub const REQUIRED: &str = "This field is required.";

/// Field-keyed validation messages plus errors that belong to the whole form.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
    non_field: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Messages for one field; empty when the field is fine.
    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// `Ok(value)` when nothing was recorded, otherwise the errors.
    pub fn finish<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Trimmed text field that must be present. Blank values pass only when
/// `allow_blank` is set. Returns the cleaned value even on error so the form
/// can be re-rendered with what the user typed.
pub(crate) fn clean_text(
    errors: &mut FormErrors,
    field: &str,
    value: Option<String>,
    max_chars: usize,
    allow_blank: bool,
) -> String {
    let Some(raw) = value else {
        errors.add(field, REQUIRED);
        return String::new();
    };

    let cleaned = raw.trim().to_string();
    if cleaned.is_empty() && !allow_blank {
        errors.add(field, REQUIRED);
    }
    check_length(errors, field, &cleaned, max_chars);
    cleaned
}

/// Secret field: presence and length only, never trimmed.
pub(crate) fn clean_secret(
    errors: &mut FormErrors,
    field: &str,
    value: Option<String>,
    max_chars: usize,
) -> String {
    match value {
        Some(raw) if !raw.is_empty() => {
            check_length(errors, field, &raw, max_chars);
            raw
        }
        _ => {
            errors.add(field, REQUIRED);
            String::new()
        }
    }
}

pub(crate) fn check_length(errors: &mut FormErrors, field: &str, value: &str, max_chars: usize) {
    let len = value.chars().count();
    if len > max_chars {
        errors.add(
            field,
            format!("Ensure this value has at most {max_chars} characters (it has {len})."),
        );
    }
}
