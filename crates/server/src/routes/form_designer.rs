//! Routes for managing form definitions, their field rows and design history.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    form_definition::{CreateFormDefinition, FormDefinition, UpdateFormDefinition},
    form_design_history::FormDesignHistory,
    form_field::{CreateFormField, FormField, UpdateFormField},
};
use serde::Deserialize;
use services::services::form_renderer::FormDataRecord;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// Header naming the acting user, recorded on history rows.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

fn acting_user(headers: &HeaderMap) -> Result<Option<i64>, ApiError> {
    let Some(raw) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("{USER_ID_HEADER} must be an integer")))
}

pub async fn list_definitions(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<FormDefinition>>>, ApiError> {
    let definitions = state.form_designer().list_definitions().await?;
    Ok(ResponseJson(ApiResponse::success(definitions)))
}

pub async fn get_definition(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
) -> Result<ResponseJson<ApiResponse<FormDefinition>>, ApiError> {
    let definition = state.form_designer().get_definition(&entity_type).await?;
    Ok(ResponseJson(ApiResponse::success(definition)))
}

pub async fn create_definition(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateFormDefinition>,
) -> Result<ResponseJson<ApiResponse<FormDefinition>>, ApiError> {
    let user_id = acting_user(&headers)?;
    let definition = state
        .form_designer()
        .create_definition(payload, user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(definition)))
}

pub async fn update_definition(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<UpdateFormDefinition>,
) -> Result<ResponseJson<ApiResponse<FormDefinition>>, ApiError> {
    let user_id = acting_user(&headers)?;
    let definition = state
        .form_designer()
        .update_definition(id, payload, user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(definition)))
}

pub async fn delete_definition(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let user_id = acting_user(&headers)?;
    state.form_designer().delete_definition(id, user_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_fields(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<Vec<FormField>>>, ApiError> {
    let fields = state.form_designer().list_fields(id).await?;
    Ok(ResponseJson(ApiResponse::success(fields)))
}

pub async fn create_field(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateFormField>,
) -> Result<ResponseJson<ApiResponse<FormField>>, ApiError> {
    let field = state.form_designer().create_field(id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(field)))
}

pub async fn update_field(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateFormField>,
) -> Result<ResponseJson<ApiResponse<FormField>>, ApiError> {
    let field = state.form_designer().update_field(id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(field)))
}

pub async fn delete_field(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.form_designer().delete_field(id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<FormDesignHistory>>>, ApiError> {
    let entries = state.form_designer().history(id, query.limit).await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

/// Validate a submitted record against the stored form. Responds with the
/// completed record, or 422 carrying the first field error.
pub async fn validate_submission(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Json(record): Json<FormDataRecord>,
) -> Result<ResponseJson<ApiResponse<FormDataRecord>>, ApiError> {
    let record = state
        .form_designer()
        .validate_submission(&entity_type, record)
        .await?;
    Ok(ResponseJson(ApiResponse::success(record)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/form-designer",
        Router::new()
            .route("/definitions", get(list_definitions).post(create_definition))
            .route("/definitions/by-entity/{entity_type}", get(get_definition))
            .route(
                "/definitions/by-entity/{entity_type}/validate",
                post(validate_submission),
            )
            .route(
                "/definitions/{id}",
                put(update_definition).delete(delete_definition),
            )
            .route("/definitions/{id}/fields", get(get_fields).post(create_field))
            .route("/definitions/{id}/history", get(get_history))
            .route("/fields/{id}", put(update_field).delete(delete_field)),
    )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use db::DBService;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::USER_ID_HEADER;
    use crate::{AppState, build_router};

    async fn app() -> axum::Router {
        let db = DBService::new_in_memory().await.unwrap();
        build_router(AppState::new(db))
    }

    async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, "9");
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn customers() -> Value {
        json!({
            "entityType": "customers",
            "displayName": "Customers",
            "fields": [
                { "fieldName": "email", "fieldLabel": "Email", "fieldType": "email",
                  "position": 3, "isRequired": true },
                { "fieldName": "name", "fieldLabel": "Name", "fieldType": "text", "position": 1 }
            ]
        })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn create_get_and_list_definitions() {
        let app = app().await;
        let (status, body) = send(&app, "POST", "/api/form-designer/definitions", Some(customers())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["fields"][0]["fieldName"], "name");
        assert_eq!(body["data"]["fields"][1]["position"], 1);

        let (status, body) = send(&app, "GET", "/api/form-designer/definitions/by-entity/customers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["displayName"], "Customers");

        let (_, body) = send(&app, "GET", "/api/form-designer/definitions", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_entity_type_is_a_conflict() {
        let app = app().await;
        send(&app, "POST", "/api/form-designer/definitions", Some(customers())).await;
        let (status, body) = send(&app, "POST", "/api/form-designer/definitions", Some(customers())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(
            body["message"],
            "Form definition for entity type 'customers' already exists"
        );
    }

    #[tokio::test]
    async fn update_writes_history_attributed_to_the_header_user() {
        let app = app().await;
        let (_, created) = send(&app, "POST", "/api/form-designer/definitions", Some(customers())).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/form-designer/definitions/{id}"),
            Some(json!({ "displayName": "Clients" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["displayName"], "Clients");

        let (_, history) = send(&app, "GET", &format!("/api/form-designer/definitions/{id}/history"), None).await;
        let entries = history["data"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["action"], "update");
        assert_eq!(entries[0]["userId"], 9);
    }

    #[tokio::test]
    async fn missing_definition_is_not_found() {
        let app = app().await;
        let (status, _) = send(&app, "GET", "/api/form-designer/definitions/by-entity/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", "/api/form-designer/definitions/77", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn field_rows_crud() {
        let app = app().await;
        let (_, created) = send(&app, "POST", "/api/form-designer/definitions", Some(customers())).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let (status, field) = send(
            &app,
            "POST",
            &format!("/api/form-designer/definitions/{id}/fields"),
            Some(json!({ "fieldName": "vip", "fieldLabel": "VIP", "fieldType": "checkbox", "position": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let field_id = field["data"]["id"].as_i64().unwrap();

        let (_, updated) = send(
            &app,
            "PUT",
            &format!("/api/form-designer/fields/{field_id}"),
            Some(json!({ "fieldLabel": "Premium" })),
        )
        .await;
        assert_eq!(updated["data"]["fieldLabel"], "Premium");

        let (_, fields) = send(&app, "GET", &format!("/api/form-designer/definitions/{id}/fields"), None).await;
        assert_eq!(fields["data"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "DELETE", &format!("/api/form-designer/fields/{field_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_submission_returns_the_field_error() {
        let app = app().await;
        send(&app, "POST", "/api/form-designer/definitions", Some(customers())).await;

        let uri = "/api/form-designer/definitions/by-entity/customers/validate";
        let (status, body) = send(&app, "POST", uri, Some(json!({ "email": "not-an-email" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Email must be a valid email");
        assert_eq!(body["error_data"]["fieldName"], "email");
        assert_eq!(body["error_data"]["kind"], "invalid_email");

        let (status, body) = send(&app, "POST", uri, Some(json!({ "email": "a@b.co" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "");
    }

    #[tokio::test]
    async fn malformed_user_header_is_rejected() {
        let app = app().await;
        let request = axum::http::Request::builder()
            .method("DELETE")
            .uri("/api/form-designer/definitions/1")
            .header(USER_ID_HEADER, "admin")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
