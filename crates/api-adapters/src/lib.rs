//! # api-adapters
//!
//! The HTTP routing and orchestration layer for Nestboard.

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;
#[cfg(feature = "web-axum")]
pub mod state;

#[cfg(feature = "web-axum")]
pub use state::AppState;

/// Builds the board's router.
///
/// Reads are public. Writes (create, edit, delete, vote) need a bearer
/// credential; the handler's `AuthPrincipal` extractor enforces it.
#[cfg(feature = "web-axum")]
pub fn router(state: AppState) -> axum::Router {
    use axum::middleware::from_fn_with_state;
    use axum::routing::{get, post};
    use tower_http::compression::CompressionLayer;
    use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

    axum::Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/api/posts",
            get(handlers::list_roots).post(handlers::create_message),
        )
        .route(
            "/api/posts/{id}",
            get(handlers::get_message)
                .put(handlers::edit_message)
                .delete(handlers::delete_message),
        )
        .route("/api/posts/{id}/vote", post(handlers::vote))
        .route("/api/posts/{id}/comments", get(handlers::list_children))
        .layer(from_fn_with_state(state.clone(), middleware::authenticate))
        .layer(from_fn_with_state(state.clone(), middleware::track_requests))
        .layer(CompressionLayer::new())
        .layer(middleware::cors_layer())
        .layer(middleware::trace_layer())
        .layer(PropagateRequestIdLayer::new(middleware::request_id_header()))
        .layer(SetRequestIdLayer::new(
            middleware::request_id_header(),
            middleware::UuidRequestId,
        ))
        .with_state(state)
}
