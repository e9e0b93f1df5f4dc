/// Request middleware and extractors
use crate::{blob_store::TenantContext, metrics};
use axum::{
    async_trait,
    extract::{FromRequestParts, MatchedPath, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::time::Instant;

/// Header carrying the caller's user identity
pub const USER_IDENTITY_HEADER: &str = "x-user-identity";

/// Header carrying the caller's node identity
pub const NODE_IDENTITY_HEADER: &str = "x-node-identity";

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
}

/// Build the tenant context from identity headers
pub fn tenant_from_headers(headers: &HeaderMap) -> TenantContext {
    TenantContext::new(
        header_value(headers, USER_IDENTITY_HEADER),
        header_value(headers, NODE_IDENTITY_HEADER),
    )
}

/// Extractor for the caller's tenant context
///
/// Never rejects; whether identities are required is the service's call.
pub struct Tenant(pub TenantContext);

#[async_trait]
impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Tenant(tenant_from_headers(&parts.headers)))
    }
}

/// Record request counts and latencies per matched route
pub async fn track_http_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    metrics::record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_tenant_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_IDENTITY_HEADER, HeaderValue::from_static("alice"));
        headers.insert(NODE_IDENTITY_HEADER, HeaderValue::from_static("  "));

        let tenant = tenant_from_headers(&headers);
        assert_eq!(tenant.user_identity.as_deref(), Some("alice"));
        assert_eq!(tenant.node_identity, None);
    }

    #[test]
    fn test_tenant_without_headers_is_anonymous() {
        assert_eq!(tenant_from_headers(&HeaderMap::new()), TenantContext::anonymous());
    }
}
