//! Router configuration for the web server.

use axum::{
    http::HeaderValue,
    routing::get,
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Browse API
        .route("/api/issues", get(handlers::list_issues))
        .route("/api/issues/:issue_id", get(handlers::get_issue))
        .route("/api/pages/:page_id", get(handlers::get_page))
        // Admin API
        .route("/api/jobs", get(handlers::list_jobs))
        .route("/api/jobs/:key", get(handlers::get_job))
        // Page images
        .route("/files/*path", get(handlers::serve_file))
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins, with credentials.
///
/// `*` cannot be combined with credentials, so it is served by echoing the
/// request origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}
