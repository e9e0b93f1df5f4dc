/// Blob storage REST endpoints
///
/// Mounted under the configured route prefix:
/// - `POST /` create
/// - `GET /` query entries
/// - `GET /:id` entry (optionally with content)
/// - `GET /:id/content` raw bytes with Range support
/// - `PUT /:id` update metadata
/// - `DELETE /:id` remove
use crate::{
    api::middleware::Tenant,
    blob_store::{
        BlobCreateResponse, CreateBlobRequest, GetOptions, QueryRequest, UpdateBlobRequest,
    },
    context::AppContext,
    entity_store::{Condition, SortDirection},
    error::{BlobError, BlobResult},
    mime::OCTET_STREAM,
    urn::BlobUrn,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, response::Builder, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Media type that selects the JSON-LD response shape
pub const JSON_LD_MEDIA_TYPE: &str = "application/ld+json";

/// Build blob routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(query_entries).post(create_blob))
        .route("/:id", get(get_entry).put(update_entry).delete(remove_entry))
        .route("/:id/content", get(get_content))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEntryParams {
    #[serde(default)]
    pub include_content: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContentParams {
    #[serde(default)]
    pub download: bool,
    pub filename: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// JSON array of conditions
    pub conditions: Option<String>,
    pub order_by: Option<String>,
    pub order_by_direction: Option<SortDirection>,
    pub cursor: Option<String>,
    pub page_size: Option<usize>,
}

impl QueryParams {
    fn into_request(self) -> BlobResult<QueryRequest> {
        let conditions = match self.conditions.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str::<Vec<Condition>>(raw).map_err(|e| {
                BlobError::Validation(format!(
                    "conditions must be a JSON array of conditions: {}",
                    e
                ))
            })?,
        };

        Ok(QueryRequest {
            conditions,
            order_by: self.order_by.filter(|s| !s.is_empty()),
            order_by_direction: self.order_by_direction,
            cursor: self.cursor.filter(|s| !s.is_empty()),
            page_size: self.page_size,
        })
    }
}

/// Whether the client asked for JSON-LD
fn wants_json_ld(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains(JSON_LD_MEDIA_TYPE))
        .unwrap_or(false)
}

/// Render a body as JSON-LD or as plain JSON without `@context`
fn negotiate<T: Serialize>(headers: &HeaderMap, body: &T) -> BlobResult<Response> {
    let mut value = serde_json::to_value(body)?;

    if wants_json_ld(headers) {
        return Ok((
            [(header::CONTENT_TYPE, JSON_LD_MEDIA_TYPE)],
            Json(value),
        )
            .into_response());
    }

    if let Value::Object(map) = &mut value {
        map.remove("@context");
    }
    Ok(Json(value).into_response())
}

fn finish(builder: Builder, body: Body) -> BlobResult<Response> {
    builder
        .body(body)
        .map_err(|e| BlobError::Internal(format!("Failed to build response: {}", e)))
}

/// Create a blob
async fn create_blob(
    State(ctx): State<AppContext>,
    Tenant(tenant): Tenant,
    Json(request): Json<CreateBlobRequest>,
) -> BlobResult<Response> {
    let id = ctx.blob_service.create(request, &tenant).await?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, id.clone())],
        Json(BlobCreateResponse { id }),
    )
        .into_response())
}

/// Get an entry
async fn get_entry(
    State(ctx): State<AppContext>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
    Query(params): Query<GetEntryParams>,
    headers: HeaderMap,
) -> BlobResult<Response> {
    let options = GetOptions {
        include_content: params.include_content,
    };
    let view = ctx.blob_service.get(&id, options, &tenant).await?;
    negotiate(&headers, &view)
}

/// Serve blob content
///
/// Sets Content-Type from the entry, caching headers, and honours Range requests
async fn get_content(
    State(ctx): State<AppContext>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
    Query(params): Query<ContentParams>,
    headers: HeaderMap,
) -> BlobResult<Response> {
    let (entry, data) = ctx.blob_service.get_content(&id, &tenant).await?;
    let total_size = data.len();

    let mime_type = entry
        .encoding_format
        .clone()
        .unwrap_or_else(|| OCTET_STREAM.to_string());

    // Blob hash is the plaintext digest, stable across encryption
    let etag = format!("\"{}\"", entry.blob_hash);

    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH) {
        if if_none_match.to_str().map(|v| v == etag).unwrap_or(false) {
            return finish(
                Response::builder()
                    .status(StatusCode::NOT_MODIFIED)
                    .header(header::ETAG, etag)
                    .header(header::CACHE_CONTROL, "private, max-age=31536000, immutable"),
                Body::empty(),
            );
        }
    }

    let disposition = content_disposition(&id, entry.file_extension.as_deref(), &params);

    if let Some(range_str) = headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        if let Some((start, end)) = parse_range(range_str, total_size) {
            let length = end - start + 1;
            let partial_data = data[start..=end].to_vec();

            return finish(
                Response::builder()
                    .status(StatusCode::PARTIAL_CONTENT)
                    .header(header::CONTENT_TYPE, &mime_type)
                    .header(header::CONTENT_LENGTH, length.to_string())
                    .header(
                        header::CONTENT_RANGE,
                        format!("bytes {}-{}/{}", start, end, total_size),
                    )
                    .header(header::CONTENT_DISPOSITION, &disposition)
                    .header(header::ETAG, etag)
                    .header(header::ACCEPT_RANGES, "bytes"),
                Body::from(partial_data),
            );
        }

        return finish(
            Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", total_size)),
            Body::empty(),
        );
    }

    finish(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, &mime_type)
            .header(header::CONTENT_LENGTH, total_size.to_string())
            .header(header::CONTENT_DISPOSITION, &disposition)
            .header(header::ETAG, etag)
            .header(header::CACHE_CONTROL, "private, max-age=31536000, immutable")
            .header(header::ACCEPT_RANGES, "bytes"),
        Body::from(data),
    )
}

/// Update entry metadata
async fn update_entry(
    State(ctx): State<AppContext>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
    Json(request): Json<UpdateBlobRequest>,
) -> BlobResult<StatusCode> {
    ctx.blob_service.update(&id, request, &tenant).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove an entry (and the blob once unreferenced)
async fn remove_entry(
    State(ctx): State<AppContext>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> BlobResult<StatusCode> {
    ctx.blob_service.remove(&id, &tenant).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List entries
async fn query_entries(
    State(ctx): State<AppContext>,
    Tenant(tenant): Tenant,
    Query(params): Query<QueryParams>,
    headers: HeaderMap,
) -> BlobResult<Response> {
    let list = ctx
        .blob_service
        .query(params.into_request()?, &tenant)
        .await?;
    negotiate(&headers, &list)
}

/// Build the Content-Disposition header value
///
/// Falls back to `<content-id>.<ext>`; quotes and control characters are dropped
/// from caller supplied names.
fn content_disposition(id: &str, extension: Option<&str>, params: &ContentParams) -> String {
    let disposition = if params.download { "attachment" } else { "inline" };

    let filename = params
        .filename
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let base = BlobUrn::parse(id)
                .map(|urn| urn.content_id().to_string())
                .unwrap_or_else(|_| "blob".to_string());
            match extension {
                Some(ext) => format!("{}.{}", base, ext),
                None => base,
            }
        });

    let filename: String = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();

    format!("{}; filename=\"{}\"", disposition, filename)
}

/// Parse HTTP Range header
///
/// Returns (start, end) inclusive byte positions, or None if invalid
fn parse_range(range_header: &str, total_size: usize) -> Option<(usize, usize)> {
    // Expected format: "bytes=start-end" or "bytes=start-" or "bytes=-suffix"
    let range_spec = range_header.trim().strip_prefix("bytes=")?;
    if total_size == 0 {
        return None;
    }

    let (start_str, end_str) = range_spec.split_once('-')?;

    if start_str.is_empty() {
        // Suffix range: "bytes=-500" (last 500 bytes)
        let suffix = end_str.parse::<usize>().ok().filter(|s| *s > 0)?;
        return Some((total_size.saturating_sub(suffix), total_size - 1));
    }

    let start = start_str.parse::<usize>().ok()?;
    if start >= total_size {
        return None;
    }

    if end_str.is_empty() {
        // Open-ended range: "bytes=500-" (from 500 to end)
        return Some((start, total_size - 1));
    }

    // Clamp end to total_size - 1
    let end = end_str.parse::<usize>().ok()?.min(total_size - 1);
    (start <= end).then_some((start, end))
}
