// Delivery HTTP API server
//
// Route table, query delivery (SSE or single-shot) and the editor endpoints.

use crate::chunk::split;
use crate::config::ServerConfig;
use crate::delivery::DeliveryMode;
use crate::session::{SessionFrame, StreamSession};
use crate::store::{JsonFileStore, ValueStore};
use crate::{MockStreamError, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{sse::Event, Html, IntoResponse, Response, Sse},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ValueStore>,
    latency: Duration,
    chunk_size: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn ValueStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            latency: config.latency(),
            chunk_size: config.chunk_size.max(1),
        }
    }
}

/// Build the route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/static/*asset", get(static_asset_handler))
        .route("/health", get(health_handler))
        .route("/query/:key", get(query_handler))
        .route(
            "/api/editor",
            get(list_entries_handler)
                .post(create_entry_handler)
                .put(update_entry_handler)
                .delete(delete_entry_handler),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Delivery HTTP server
pub struct DeliveryServer {
    config: ServerConfig,
    store: Arc<dyn ValueStore>,
}

impl DeliveryServer {
    pub fn new(config: ServerConfig) -> Self {
        let store = Arc::new(JsonFileStore::new(&config.data_path));
        Self { config, store }
    }

    pub fn with_store(mut self, store: Arc<dyn ValueStore>) -> Self {
        self.store = store;
        self
    }

    /// Serve until the process is stopped.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `signal` resolves, then stop accepting connections.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.addr();
        info!(
            target: "delivery",
            addr = %addr,
            latency_ms = self.config.latency_ms,
            "Starting delivery server"
        );

        let app = router(AppState::new(self.store, &self.config));

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let url = format!("http://{}", listener.local_addr()?);
        info!(target: "delivery", url = %url, "Test dashboard running");
        info!(target: "delivery", route = %format!("{url}/query/[q]"), "Query API route");
        info!(target: "delivery", route = %format!("{url}/api/editor"), "Data edit API route");

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await?;

        Ok(())
    }
}

/// Failures surfaced to HTTP clients as status + plain-text body
#[derive(Debug)]
enum ApiError {
    QueryNotFound,
    KeyNotFound,
    BadRequest(&'static str),
    Store(MockStreamError),
}

impl From<MockStreamError> for ApiError {
    fn from(err: MockStreamError) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::QueryNotFound => (StatusCode::NOT_FOUND, "Query not found.").into_response(),
            ApiError::KeyNotFound => (StatusCode::NOT_FOUND, "Key not found.").into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Store(e) => {
                error!(target: "delivery", error = %e, "Store request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error.").into_response()
            }
        }
    }
}

/// Query parameters for the query endpoint
#[derive(Deserialize)]
struct QueryParams {
    #[serde(rename = "errorTimeout")]
    error_timeout: Option<String>,
}

/// Empty means "no timeout"; anything else must be whole milliseconds.
fn parse_error_timeout(raw: Option<&str>) -> std::result::Result<Option<Duration>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(ms) => ms
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ApiError::BadRequest("Invalid errorTimeout.")),
    }
}

/// Stream or return the value stored under `key`
async fn query_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<QueryParams>,
    headers: HeaderMap,
) -> std::result::Result<Response, ApiError> {
    let value = state
        .store
        .lookup(&key)
        .await?
        .ok_or(ApiError::QueryNotFound)?;

    match DeliveryMode::from_headers(&headers) {
        DeliveryMode::SingleShot => {
            info!(target: "delivery", key = %key, "Single-shot query");
            Ok(Json(serde_json::json!({ "text": value })).into_response())
        }
        DeliveryMode::EventStream => {
            let timeout = parse_error_timeout(params.error_timeout.as_deref())?;
            let session = StreamSession::new(split(&value, state.chunk_size), state.latency)
                .with_timeout(timeout);
            info!(
                target: "delivery",
                key = %key,
                chunks = session.len(),
                timeout_ms = timeout.map(|t| t.as_millis() as u64),
                "Streaming query"
            );

            let stream = session
                .spawn()
                .map(|frame| Ok::<_, Infallible>(sse_event(frame)));
            Ok(Sse::new(stream).into_response())
        }
    }
}

/// `data: <chunk>` for data frames, `event: end` / `data: end` for the end marker.
fn sse_event(frame: SessionFrame) -> Event {
    match frame {
        // SSE field values cannot carry CR; LF is split into data lines.
        SessionFrame::Data(chunk) => Event::default().data(chunk.replace('\r', "")),
        SessionFrame::End => Event::default().event("end").data("end"),
    }
}

/// Request body for the editor endpoints
#[derive(Deserialize)]
struct EditorBody {
    key: Option<String>,
    value: Option<String>,
}

impl EditorBody {
    fn key_and_value(body: Option<Json<EditorBody>>) -> Option<(String, String)> {
        let Json(body) = body?;
        match (body.key, body.value) {
            (Some(key), Some(value)) if !key.is_empty() => Some((key, value)),
            _ => None,
        }
    }

    fn key(body: Option<Json<EditorBody>>) -> Option<String> {
        let Json(body) = body?;
        body.key.filter(|key| !key.is_empty())
    }
}

const KEY_AND_VALUE_REQUIRED: &str = "Bad Request: key and value are required.";

async fn list_entries_handler(
    State(state): State<AppState>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let entries = state.store.entries().await?;
    Ok(Json(entries))
}

async fn create_entry_handler(
    State(state): State<AppState>,
    body: Option<Json<EditorBody>>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let (key, value) =
        EditorBody::key_and_value(body).ok_or(ApiError::BadRequest(KEY_AND_VALUE_REQUIRED))?;
    state.store.insert(&key, &value).await?;
    info!(target: "editor", key = %key, "Entry added");
    Ok((StatusCode::CREATED, "Successfully added the data"))
}

async fn update_entry_handler(
    State(state): State<AppState>,
    body: Option<Json<EditorBody>>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let (key, value) =
        EditorBody::key_and_value(body).ok_or(ApiError::BadRequest(KEY_AND_VALUE_REQUIRED))?;
    if !state.store.update(&key, &value).await? {
        return Err(ApiError::KeyNotFound);
    }
    info!(target: "editor", key = %key, "Entry updated");
    Ok((StatusCode::OK, "Data successfully updated."))
}

async fn delete_entry_handler(
    State(state): State<AppState>,
    body: Option<Json<EditorBody>>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let key = EditorBody::key(body).ok_or(ApiError::BadRequest("Bad Request: key is required."))?;
    if !state.store.remove(&key).await? {
        return Err(ApiError::KeyNotFound);
    }
    info!(target: "editor", key = %key, "Entry deleted");
    Ok((StatusCode::OK, "Data successfully deleted."))
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Serve the tester page
async fn index_handler() -> Html<&'static str> {
    Html(crate::delivery::static_assets::INDEX_HTML)
}

async fn static_asset_handler(Path(asset): Path<String>) -> impl IntoResponse {
    match crate::delivery::static_assets::get(asset.as_str()) {
        Some(asset) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = header::HeaderValue::from_str(asset.content_type) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (StatusCode::OK, headers, asset.body).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_timeout_accepts_whole_milliseconds() {
        assert_eq!(
            parse_error_timeout(Some("50")).ok(),
            Some(Some(Duration::from_millis(50)))
        );
        assert_eq!(
            parse_error_timeout(Some("0")).ok(),
            Some(Some(Duration::ZERO))
        );
    }

    #[test]
    fn error_timeout_empty_or_missing_is_none() {
        assert_eq!(parse_error_timeout(None).ok(), Some(None));
        assert_eq!(parse_error_timeout(Some("")).ok(), Some(None));
    }

    #[test]
    fn error_timeout_rejects_garbage() {
        assert!(matches!(
            parse_error_timeout(Some("soon")),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            parse_error_timeout(Some("-5")),
            Err(ApiError::BadRequest(_))
        ));
    }
}
