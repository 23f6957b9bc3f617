use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{form_designer::FormDesignerError, form_validation::FieldValidationError};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    FormDesigner(#[from] FormDesignerError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::FormDesigner(err) => match err {
                FormDesignerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                FormDesignerError::NotFound(_) => StatusCode::NOT_FOUND,
                FormDesignerError::DuplicateEntityType(_) | FormDesignerError::Inactive(_) => {
                    StatusCode::CONFLICT
                }
                FormDesignerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                FormDesignerError::Database(_) | FormDesignerError::Serde(_) => {
                    error!("form designer request failed: {}", err);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        };

        let body = match self {
            ApiError::FormDesigner(FormDesignerError::Validation(field_error)) => {
                ApiResponse::<(), FieldValidationError>::error_with_data(&message, field_error)
            }
            _ => ApiResponse::<(), FieldValidationError>::error(&message),
        };
        (status, Json(body)).into_response()
    }
}
