use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/parse", post(routes::parse::parse))
        .route("/index", post(routes::index::index))
        .route("/search", post(routes::search::search))
        .route("/metadata/check", post(routes::metadata::check))
        .route("/metadata/update", post(routes::metadata::update))
        .route("/metadata/{index_id}", delete(routes::metadata::delete))
        .route(
            "/connectors",
            post(routes::connectors::create).get(routes::connectors::list),
        )
        .route("/connectors/types", get(routes::connectors::types))
        .route(
            "/connectors/{connector_id}/status",
            get(routes::connectors::status),
        )
        .route(
            "/connectors/{connector_id}/sync",
            post(routes::connectors::sync),
        )
        .route(
            "/connectors/{connector_id}",
            delete(routes::connectors::delete),
        )
        .route("/config", get(routes::config::get_config))
        .route(
            "/config/mark-reindexed",
            post(routes::config::mark_reindexed),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
