use axum::Router;

use crate::AppState;

pub mod form_designer;
pub mod health;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(form_designer::router(state))
}
