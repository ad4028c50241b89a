use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::store::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Descriptor management
        .route("/apis", post(handlers::create_api::<S>))
        .route("/apis/:id", get(handlers::get_api::<S>))
        .route("/apis/:id", put(handlers::update_api::<S>))
        .route("/apis/:id", delete(handlers::delete_api::<S>))
        .route(
            "/apis/:id/definition",
            put(handlers::update_definition::<S>),
        )
        // Lifecycle
        .route(
            "/apis/:id/lifecycle",
            post(handlers::transition_lifecycle::<S>),
        )
        .route(
            "/apis/:id/lifecycle-history",
            get(handlers::get_lifecycle_history::<S>),
        )
}
