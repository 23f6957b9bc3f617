//! Headless form renderer: turns a stored field list into a sequence of
//! type-specific widgets, collects input into a flat record and validates it
//! before handing it to the caller's submit handler.

use std::collections::BTreeMap;

use async_trait::async_trait;
use db::models::field_spec::{FieldOption, FieldSpec, FieldType, sorted_by_position};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;

use super::form_validation::{FieldValidationError, validate_record};

/// Entered values keyed by `fieldName`. Every value is a string; checkbox
/// values are `"true"` or `"false"` once toggled.
pub type FormDataRecord = BTreeMap<String, String>;

pub const CHECKBOX_TRUE: &str = "true";
pub const CHECKBOX_FALSE: &str = "false";
pub const DATE_PLACEHOLDER: &str = "YYYY-MM-DD";
pub const SELECT_PLACEHOLDER: &str = "Select an option";
pub const DEFAULT_SUBMIT_LABEL: &str = "Submit";
pub const SUBMITTING_LABEL: &str = "Submitting...";

/// Input-method hint for single-line inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum KeyboardHint {
    Default,
    Email,
    Decimal,
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum LabelPlacement {
    Above,
    Inline,
}

/// Input surface for one field.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    TextInput {
        keyboard: KeyboardHint,
        placeholder: Option<String>,
        height: i32,
    },
    TextArea {
        placeholder: Option<String>,
        min_height: i32,
    },
    /// The first choice is always the empty "unselected" entry.
    Select { choices: Vec<FieldOption>, height: i32 },
    Toggle { checked: bool },
}

/// A field ready to be drawn, in render order.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RenderedField {
    pub field_id: String,
    pub field_name: String,
    pub label: String,
    pub required: bool,
    pub label_placement: LabelPlacement,
    pub widget: Widget,
    pub value: String,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
pub struct SubmitButton {
    pub label: String,
    pub disabled: bool,
}

/// Receives a validated record. Called at most once per `submit`.
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn submit(&self, record: FormDataRecord) -> Result<(), Self::Error>;
}

#[derive(Debug, Error)]
pub enum SubmitError<E>
where
    E: std::error::Error + 'static,
{
    #[error("form is already submitting")]
    Busy,
    #[error(transparent)]
    Validation(#[from] FieldValidationError),
    #[error("submit failed: {0}")]
    Handler(#[source] E),
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn text_input(field: &FieldSpec, keyboard: KeyboardHint) -> Widget {
    Widget::TextInput {
        keyboard,
        placeholder: field.placeholder.clone(),
        height: field.height,
    }
}

/// Widget for `field`, given its current value.
pub fn widget_for(field: &FieldSpec, value: &str) -> Widget {
    match field.field_type {
        FieldType::Text => text_input(field, KeyboardHint::Default),
        FieldType::Email => text_input(field, KeyboardHint::Email),
        FieldType::Number => text_input(field, KeyboardHint::Decimal),
        FieldType::Phone => text_input(field, KeyboardHint::Phone),
        FieldType::Date => Widget::TextInput {
            keyboard: KeyboardHint::Default,
            placeholder: Some(non_empty(&field.placeholder).unwrap_or(DATE_PLACEHOLDER).to_string()),
            height: field.height,
        },
        FieldType::Textarea => Widget::TextArea {
            placeholder: field.placeholder.clone(),
            min_height: field.height,
        },
        FieldType::Select => {
            let unselected = FieldOption::new(
                "",
                non_empty(&field.placeholder).unwrap_or(SELECT_PLACEHOLDER),
            );
            Widget::Select {
                choices: std::iter::once(unselected)
                    .chain(field.effective_options().iter().cloned())
                    .collect(),
                height: field.height,
            }
        }
        FieldType::Checkbox => Widget::Toggle {
            checked: value == CHECKBOX_TRUE,
        },
    }
}

fn label_placement(field_type: FieldType) -> LabelPlacement {
    match field_type {
        FieldType::Checkbox => LabelPlacement::Inline,
        FieldType::Text
        | FieldType::Email
        | FieldType::Number
        | FieldType::Textarea
        | FieldType::Select
        | FieldType::Date
        | FieldType::Phone => LabelPlacement::Above,
    }
}

/// One data-entry session over a field list.
#[derive(Debug, Clone)]
pub struct FormRenderer {
    fields: Vec<FieldSpec>,
    record: FormDataRecord,
    is_loading: bool,
    notice: Option<FieldValidationError>,
}

impl FormRenderer {
    /// The field list is kept in the order given; only rendering sorts by
    /// position. The record is seeded with every field's default (empty when
    /// absent), then overlaid with the values of `initial` that belong to a
    /// field.
    pub fn new(fields: Vec<FieldSpec>, initial: Option<FormDataRecord>) -> Self {
        let mut record: FormDataRecord = fields
            .iter()
            .map(|f| (f.field_name.clone(), f.default_value.clone().unwrap_or_default()))
            .collect();

        if let Some(initial) = initial {
            for (name, value) in initial {
                if let Some(slot) = record.get_mut(&name) {
                    *slot = value;
                }
            }
        }

        debug!(field_count = fields.len(), "form renderer initialised");
        Self {
            fields,
            record,
            is_loading: false,
            notice: None,
        }
    }

    /// Fields in the order given, which is also validation order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn record(&self) -> &FormDataRecord {
        &self.record
    }

    pub fn value(&self, field_name: &str) -> Option<&str> {
        self.record.get(field_name).map(String::as_str)
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Caller-owned submitting flag. While set, inputs and submit are inert.
    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    /// The last validation failure shown to the user, if any.
    pub fn notice(&self) -> Option<&FieldValidationError> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Widgets in ascending position; ties keep list order.
    pub fn render(&self) -> Vec<RenderedField> {
        sorted_by_position(&self.fields)
            .iter()
            .map(|field| {
                let value = self.value(&field.field_name).unwrap_or_default().to_string();
                RenderedField {
                    field_id: field.id.clone(),
                    field_name: field.field_name.clone(),
                    label: field.field_label.clone(),
                    required: field.is_required,
                    label_placement: label_placement(field.field_type),
                    widget: widget_for(field, &value),
                    value,
                    disabled: self.is_loading,
                }
            })
            .collect()
    }

    pub fn submit_button(&self, label: Option<&str>) -> SubmitButton {
        let label = if self.is_loading {
            SUBMITTING_LABEL
        } else {
            label.unwrap_or(DEFAULT_SUBMIT_LABEL)
        };
        SubmitButton {
            label: label.to_string(),
            disabled: self.is_loading,
        }
    }

    fn field(&self, field_name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.field_name == field_name)
    }

    /// Record an edit. Returns `false` when ignored: the form is loading or no
    /// field has that name. Checkbox fields only ever store `"true"` or
    /// `"false"`.
    pub fn set_value(&mut self, field_name: &str, value: impl Into<String>) -> bool {
        if self.is_loading {
            return false;
        }
        let Some(field_type) = self.field(field_name).map(|f| f.field_type) else {
            return false;
        };

        let value = value.into();
        let value = match field_type {
            FieldType::Checkbox if value == CHECKBOX_TRUE => CHECKBOX_TRUE.to_string(),
            FieldType::Checkbox => CHECKBOX_FALSE.to_string(),
            _ => value,
        };
        self.record.insert(field_name.to_string(), value);
        true
    }

    pub fn toggle(&mut self, field_name: &str, checked: bool) -> bool {
        let value = if checked { CHECKBOX_TRUE } else { CHECKBOX_FALSE };
        self.set_value(field_name, value)
    }

    /// Runs the field rules in list order; the first failure wins.
    pub fn validate(&self) -> Result<(), FieldValidationError> {
        validate_record(&self.fields, &self.record)
    }

    /// Validate and, on success, hand the full record to `handler`. The
    /// entered data is never cleared and the loading flag is left to the
    /// caller.
    pub async fn submit<H>(&mut self, handler: &H) -> Result<(), SubmitError<H::Error>>
    where
        H: SubmitHandler + ?Sized,
    {
        if self.is_loading {
            debug!("submit ignored while loading");
            return Err(SubmitError::Busy);
        }

        if let Err(err) = self.validate() {
            info!(field = %err.field_name, kind = %err.kind, "form validation failed");
            self.notice = Some(err.clone());
            return Err(SubmitError::Validation(err));
        }

        self.notice = None;
        handler
            .submit(self.record.clone())
            .await
            .map_err(SubmitError::Handler)
    }
}
