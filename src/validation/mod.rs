//! Input validation rules shared by the auth and feed services.
//!
//! Rules operate on trimmed input. Failures are collected as
//! [`FieldError`]s so a client sees every problem with a form at once.

use serde::Serialize;

/// One failed rule for one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    #[serde(rename = "path")]
    pub field: String,
    pub value: String,
    #[serde(rename = "msg")]
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}

/// Accumulates field errors for a single form.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, value: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, value, message));
        }
        self
    }

    pub fn push(&mut self, error: FieldError) -> &mut Self {
        self.errors.push(error);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }
}

pub fn not_empty(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn min_trimmed_len(value: &str, min: usize) -> bool {
    value.trim().chars().count() >= min
}

/// Structural email check: one `@`, a non-empty local part drawn from the
/// RFC 5322 atom characters, and a dotted domain whose labels are
/// alphanumeric with inner hyphens.
pub fn is_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || "!#$%&'*+/=?^_`{|}~-".contains(c));
    if !local_ok {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Lower-cases and trims an address so lookups are case-insensitive.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
