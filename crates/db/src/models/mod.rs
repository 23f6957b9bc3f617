pub mod field_spec;
pub mod form_definition;
pub mod form_design_history;
pub mod form_field;
