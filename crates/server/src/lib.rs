//! HTTP surface of the form designer.

use axum::Router;
use db::DBService;
use services::services::form_designer::FormDesignerService;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod routes;

/// Shared handler state. Cloning shares the database pool.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
}

impl AppState {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn form_designer(&self) -> FormDesignerService {
        FormDesignerService::new(self.db.pool.clone())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::router(&state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
