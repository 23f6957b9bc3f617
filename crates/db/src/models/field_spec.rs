//! The field specification shared by the store, the builder and the renderer.
//!
//! A `FieldSpec` is persisted inside `FormDefinition::fields` as a JSON array
//! in camelCase, and travels unchanged across the HTTP boundary.

use serde::{Deserialize, Serialize};
use sqlx::Type;
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;

pub const MIN_WIDTH: i32 = 50;
pub const MAX_WIDTH: i32 = 100;
pub const MIN_HEIGHT: i32 = 30;
pub const DEFAULT_WIDTH: i32 = 100;
pub const DEFAULT_HEIGHT: i32 = 40;

/// Kind of input a field collects. Each variant implies its own widget and
/// validation rule.
#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    TS,
    EnumString,
    Display,
    EnumIter,
    Default,
)]
#[sqlx(type_name = "field_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Email,
    Number,
    Textarea,
    Select,
    Checkbox,
    Date,
    Phone,
}

impl FieldType {
    /// Label shown in the builder's type picker.
    pub fn label(self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::Email => "Email",
            FieldType::Number => "Number",
            FieldType::Textarea => "Textarea",
            FieldType::Select => "Select",
            FieldType::Checkbox => "Checkbox",
            FieldType::Date => "Date",
            FieldType::Phone => "Phone",
        }
    }

    pub fn uses_options(self) -> bool {
        matches!(self, FieldType::Select)
    }
}

/// One choice of a `select` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// One configurable form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    #[serde(default = "new_field_id")]
    pub id: String,
    pub field_name: String,
    pub field_label: String,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_width")]
    pub width: i32,
    #[serde(default = "default_height")]
    pub height: i32,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub options: Vec<FieldOption>,
    /// Free-form validation hints carried for clients; not interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub validation: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub metadata: Option<serde_json::Value>,
}

/// Fresh opaque field id. Ids are never reused, even after a delete.
pub fn new_field_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_width() -> i32 {
    DEFAULT_WIDTH
}

fn default_height() -> i32 {
    DEFAULT_HEIGHT
}

impl FieldSpec {
    /// Template for the field appended when a form already holds `count` fields.
    pub fn new_default(count: usize) -> Self {
        let n = count + 1;
        Self {
            id: new_field_id(),
            field_name: format!("field_{n}"),
            field_label: format!("Field {n}"),
            field_type: FieldType::Text,
            position: i32::try_from(count).unwrap_or(i32::MAX),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            is_required: false,
            placeholder: Some(String::new()),
            default_value: None,
            options: Vec::new(),
            validation: None,
            metadata: None,
        }
    }

    pub fn clamp_dimensions(&mut self) {
        self.width = clamp_width(self.width);
        self.height = clamp_height(self.height);
    }

    /// Options that apply to this field; empty unless it is a `select`.
    pub fn effective_options(&self) -> &[FieldOption] {
        if self.field_type.uses_options() {
            &self.options
        } else {
            &[]
        }
    }
}

pub fn clamp_width(width: i32) -> i32 {
    width.clamp(MIN_WIDTH, MAX_WIDTH)
}

pub fn clamp_height(height: i32) -> i32 {
    height.max(MIN_HEIGHT)
}

/// Lenient integer read of an editor keystroke buffer: leading whitespace and
/// sign are accepted, digits are read up to the first non-digit, and an empty,
/// non-numeric or zero result yields `fallback`.
pub fn parse_dimension_input(input: &str, fallback: i32) -> i32 {
    let trimmed = input.trim_start();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: &str = rest
        .find(|c: char| !c.is_ascii_digit())
        .map_or(rest, |end| &rest[..end]);

    match digits.parse::<i32>() {
        Ok(0) | Err(_) => fallback,
        Ok(value) if negative => -value,
        Ok(value) => value,
    }
}

/// Rewrite every position to its index in the slice.
pub fn reindex_positions(fields: &mut [FieldSpec]) {
    for (index, field) in fields.iter_mut().enumerate() {
        field.position = i32::try_from(index).unwrap_or(i32::MAX);
    }
}

/// Stable-sort by position, then reindex so positions are exactly `0..n-1`.
pub fn normalize_positions(fields: &mut [FieldSpec]) {
    fields.sort_by_key(|field| field.position);
    reindex_positions(fields);
}

/// Copy of `fields` in ascending position order. Ties keep their input order.
pub fn sorted_by_position(fields: &[FieldSpec]) -> Vec<FieldSpec> {
    let mut sorted = fields.to_vec();
    sorted.sort_by_key(|field| field.position);
    sorted
}
