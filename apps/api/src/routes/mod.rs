pub mod health;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::errors::{attach_request_id, panic_response};
use crate::pipeline::handlers::{self, MAX_UPLOAD_BYTES};
use crate::render::handlers::handle_render;
use crate::state::AppState;

/// Room for multipart framing around a maximum-size file.
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health::health_handler))
        // Pipeline API
        .route("/api/v1/score", post(handlers::handle_score))
        .route(
            "/api/v1/transform-section",
            post(handlers::handle_transform_section),
        )
        .route("/api/v1/tailor", post(handlers::handle_tailor))
        // Resume intake
        .route(
            "/api/v1/resumes/upload",
            post(handlers::handle_upload_resume)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + UPLOAD_BODY_SLACK)),
        )
        // Render API
        .route("/api/v1/render", post(handle_render))
        .with_state(state);

    with_request_layers(routes)
}

/// Request id, tracing, panic recovery and request-id stamping of error bodies.
/// Panics become JSON 500s inside the stamping layer, so they carry the id too.
fn with_request_layers(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(attach_request_id))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
