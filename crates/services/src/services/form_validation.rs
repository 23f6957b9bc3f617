//! Per-field validation rules applied to rendered form records.

use db::models::field_spec::{FieldSpec, FieldType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use ts_rs::TS;

use super::form_renderer::FormDataRecord;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+]?[(]?[0-9]{1,4}[)]?[-\s.]?[(]?[0-9]{1,4}[)]?[-\s.]?[0-9]{1,9}$")
        .expect("phone pattern compiles")
});

// Longest-prefix float literal, the way a lenient numeric parse reads "12.5kg".
// ASCII digits only.
static NUMBER_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(Infinity|([0-9]+\.?[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?)")
        .expect("number pattern compiles")
});

/// Which rule a value failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationKind {
    Required,
    InvalidEmail,
    InvalidPhone,
    InvalidNumber,
}

/// First validation failure of a record, attributable to one field.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct FieldValidationError {
    pub field_name: String,
    pub field_label: String,
    pub kind: ValidationKind,
    pub message: String,
}

impl FieldValidationError {
    fn new(field: &FieldSpec, kind: ValidationKind) -> Self {
        let label = &field.field_label;
        let message = match kind {
            ValidationKind::Required => format!("{label} is required"),
            ValidationKind::InvalidEmail => format!("{label} must be a valid email"),
            ValidationKind::InvalidPhone => format!("{label} must be a valid phone number"),
            ValidationKind::InvalidNumber => format!("{label} must be a number"),
        };
        Self {
            field_name: field.field_name.clone(),
            field_label: field.field_label.clone(),
            kind,
            message,
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn is_valid_phone(value: &str) -> bool {
    PHONE_RE.is_match(value)
}

/// True when a float can be read from the start of `value` (after leading
/// whitespace). `"12.5"`, `"3abc"` and `"-1e3"` pass; `"abc"` does not.
pub fn parses_as_number(value: &str) -> bool {
    NUMBER_PREFIX_RE.is_match(value.trim_start())
}

/// Check one value against the rules of its field. An absent value counts as
/// empty. Rules after the required check only apply to non-empty values.
pub fn validate_field(field: &FieldSpec, value: Option<&str>) -> Result<(), FieldValidationError> {
    let value = value.unwrap_or_default();
    if value.is_empty() {
        return if field.is_required {
            Err(FieldValidationError::new(field, ValidationKind::Required))
        } else {
            Ok(())
        };
    }

    let failure = match field.field_type {
        FieldType::Email if !is_valid_email(value) => Some(ValidationKind::InvalidEmail),
        FieldType::Phone if !is_valid_phone(value) => Some(ValidationKind::InvalidPhone),
        FieldType::Number if !parses_as_number(value) => Some(ValidationKind::InvalidNumber),
        FieldType::Text
        | FieldType::Email
        | FieldType::Number
        | FieldType::Textarea
        | FieldType::Select
        | FieldType::Checkbox
        | FieldType::Date
        | FieldType::Phone => None,
    };

    match failure {
        Some(kind) => Err(FieldValidationError::new(field, kind)),
        None => Ok(()),
    }
}

/// Validate `record` against `fields` in the order given; the first failure
/// wins.
pub fn validate_record(
    fields: &[FieldSpec],
    record: &FormDataRecord,
) -> Result<(), FieldValidationError> {
    fields.iter().try_for_each(|field| {
        validate_field(field, record.get(&field.field_name).map(String::as_str))
    })
}
