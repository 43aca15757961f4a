use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// Browser clients call from other origins; credentials travel as bearer tokens.
pub fn api_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any)
}
