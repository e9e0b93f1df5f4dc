/// HTTP server setup and routing
use crate::{
    api::middleware::{track_http_metrics, NODE_IDENTITY_HEADER, USER_IDENTITY_HEADER},
    context::AppContext,
    error::{BlobError, BlobResult},
    metrics,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Room for JSON framing around the base64 payload
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Request body limit for a decoded upload limit, base64 grows payloads by 4/3
fn body_limit(upload_limit: usize) -> usize {
    upload_limit
        .saturating_mul(4)
        .div_ceil(3)
        .saturating_add(BODY_LIMIT_SLACK)
}

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::RANGE,
            header::IF_NONE_MATCH,
            HeaderName::from_static(USER_IDENTITY_HEADER),
            HeaderName::from_static(NODE_IDENTITY_HEADER),
        ])
        .expose_headers([
            header::LOCATION,
            header::ETAG,
            header::CONTENT_RANGE,
            header::CONTENT_DISPOSITION,
        ]);

    let limit = body_limit(ctx.config.service.blob_upload_limit);

    Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(crate::api::routes(&ctx.config.service.route_prefix))
        // Provide state - converts Router<AppContext> to Router<()>
        .with_state(ctx)
        .layer(middleware::from_fn(track_http_metrics))
        .layer(DefaultBodyLimit::max(limit))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// Prometheus scrape endpoint
async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> BlobResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Blob storage service listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());
    info!(
        "   Default namespace: {}",
        ctx.blob_service.config().default_namespace
    );

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BlobError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| BlobError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
