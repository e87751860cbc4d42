//! Router assembly.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::middleware as axum_mw;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::auth_middleware;
use crate::routes;
use crate::routes::reveal::REVEAL_KEY_HEADER;
use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
///
/// `reveal_concurrency` caps in-flight reveal requests.
pub fn build_router(state: Arc<AppState>, reveal_concurrency: usize) -> Router {
    let reveal_routes =
        routes::reveal::router().layer(ConcurrencyLimitLayer::new(reveal_concurrency));

    // Authenticated routes go through the auth middleware layer.
    let authenticated_routes = Router::new()
        .merge(routes::servers::router())
        .merge(routes::providers::router())
        .merge(routes::settings::router())
        .merge(routes::auth::router())
        .merge(reveal_routes)
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, REVEAL_KEY_HEADER]);

    Router::new()
        .merge(routes::health::router())
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
