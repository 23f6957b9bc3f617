pub mod form_builder;
pub mod form_designer;
pub mod form_renderer;
pub mod form_validation;
