/// API routes and handlers
pub mod blob;
pub mod health;
pub mod middleware;

use crate::context::AppContext;
use axum::Router;

/// Build API routes, blob routes nested under `route_prefix`
pub fn routes(route_prefix: &str) -> Router<AppContext> {
    let blob_routes = blob::routes();
    let router = Router::new().merge(health::routes());

    match route_prefix.trim_end_matches('/') {
        "" => router.merge(blob_routes),
        prefix => router.nest(prefix, blob_routes),
    }
}
