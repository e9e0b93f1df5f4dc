/// Health endpoints
///
/// `/health/live` answers as long as the process serves requests,
/// `/health/ready` only once the entry store and the default connector are usable.
use crate::{
    context::AppContext,
    error::{BlobError, BlobResult},
};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

lazy_static! {
    static ref STARTED_AT: Instant = Instant::now();
}

/// Component or overall state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Unhealthy,
}

/// Detailed health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: Status,
    pub version: String,
    pub uptime_seconds: f64,
    pub components: Vec<ComponentReport>,
}

/// One checked component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    pub name: String,
    pub status: Status,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ComponentReport {
    fn from_check(name: &str, started: Instant, result: BlobResult<Value>) -> Self {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(details) => Self {
                name: name.to_string(),
                status: Status::Healthy,
                elapsed_ms,
                error: None,
                details: Some(details),
            },
            Err(e) => Self {
                name: name.to_string(),
                status: Status::Unhealthy,
                elapsed_ms,
                error: Some(e.to_string()),
                details: None,
            },
        }
    }
}

pub fn routes() -> Router<AppContext> {
    lazy_static::initialize(&STARTED_AT);

    Router::new()
        .route("/health", get(live))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .route("/health/detailed", get(detailed))
}

async fn live() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn ready(State(ctx): State<AppContext>) -> (StatusCode, Json<Value>) {
    let report = collect(&ctx).await;

    if report.status != Status::Healthy {
        for component in report.components.iter().filter(|c| c.status != Status::Healthy) {
            tracing::warn!(
                component = %component.name,
                error = component.error.as_deref().unwrap_or_default(),
                "readiness_check_failed"
            );
        }
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

async fn detailed(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthReport>) {
    let report = collect(&ctx).await;
    let code = match report.status {
        Status::Healthy => StatusCode::OK,
        Status::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report))
}

async fn collect(ctx: &AppContext) -> HealthReport {
    let started = Instant::now();
    let entry_store = ComponentReport::from_check("entry_store", started, entry_store(ctx).await);

    let started = Instant::now();
    let connectors = ComponentReport::from_check("blob_connectors", started, connectors(ctx));

    let components = vec![entry_store, connectors];
    HealthReport {
        status: overall(&components),
        version: ctx.config.service.version.clone(),
        uptime_seconds: STARTED_AT.elapsed().as_secs_f64(),
        components,
    }
}

/// Ping the entry database; the memory store has nothing to check
async fn entry_store(ctx: &AppContext) -> BlobResult<Value> {
    match &ctx.entry_db {
        Some(db) => {
            crate::db::test_connection(db).await?;
            Ok(json!({ "backend": "sqlite", "connections": db.size() }))
        }
        None => Ok(json!({ "backend": "memory" })),
    }
}

/// The default namespace must have a connector
fn connectors(ctx: &AppContext) -> BlobResult<Value> {
    let service = &ctx.blob_service;
    let default_namespace = &service.config().default_namespace;
    if !service.connectors().contains(default_namespace) {
        return Err(BlobError::Internal(format!(
            "No connector for default namespace {}",
            default_namespace
        )));
    }
    Ok(json!({
        "namespaces": service.connectors().namespaces(),
        "default": default_namespace,
    }))
}

fn overall(components: &[ComponentReport]) -> Status {
    if components.iter().all(|c| c.status == Status::Healthy) {
        Status::Healthy
    } else {
        Status::Unhealthy
    }
}
