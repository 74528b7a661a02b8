//! The HTTP gateway: one endpoint translating requests into
//! acquire + update.
//!
//! Query parameters and form fields merge into the action's argument map;
//! JSON bodies (and raw payloads) arrive under the `body` argument. The
//! `asset` parameter selects the mount path. Responses default to JSON and
//! may be overridden by the action through the context's mimetype; errors
//! render as `{message, exception, stacktrace}`.

use crate::core::{CallError, CallResult, StoreError};
use crate::persist::external::encode_bytes;
use crate::store::context::{SharedRegistry, UpdateContext};
use crate::store::store::AssetStore;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub const DEFAULT_MAX_BODY_SIZE: usize = 1_000_000;
pub const DEFAULT_ASSET: &str = "www.index";
const JSON_MIMETYPE: &str = "application/json";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub max_body_size: usize,
    pub default_asset: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            default_asset: DEFAULT_ASSET.to_string(),
        }
    }
}

/// Shared gateway state: the store, the registry, and the identity every
/// request runs under.
pub struct Gateway {
    pub store: Arc<AssetStore>,
    pub registry: SharedRegistry,
    pub user: String,
    pub group: String,
    pub config: GatewayConfig,
}

impl Gateway {
    pub fn new(
        store: Arc<AssetStore>,
        registry: SharedRegistry,
        user: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            user: user.into(),
            group: group.into(),
            config: GatewayConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    fn context(&self) -> UpdateContext {
        UpdateContext::new(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            self.user.clone(),
            self.group.clone(),
        )
    }
}

fn error_body(message: &str, exception: &str, stacktrace: Vec<String>) -> JsonValue {
    json!({
        "message": message,
        "exception": exception,
        "stacktrace": stacktrace,
    })
}

fn store_error_response(err: &StoreError) -> Response {
    let status = match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        StoreError::InvalidArgument(_) | StoreError::TypeMismatch(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(error_body(&err.to_string(), err.kind(), vec![err.to_string()])),
    )
        .into_response()
}

fn call_error_response(error: &CallError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(error_body(
            &error.message,
            &error.exception,
            error.stacktrace.clone(),
        )),
    )
        .into_response()
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                    (Some(high), Some(low)) => {
                        out.push(high << 4 | low);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            other => out.push(other),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse an urlencoded form body into key/value pairs.
fn parse_form(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (percent_decode(key), percent_decode(value)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

async fn process(
    State(gateway): State<Arc<Gateway>>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4();

    let mut parameters = serde_json::Map::new();
    for (key, value) in query {
        parameters.insert(key, json!(value));
    }

    if method == Method::POST {
        if body.len() > gateway.config.max_body_size {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "Request body exceeds maximum allowed size." })),
            )
                .into_response();
        }

        if !body.is_empty() {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();

            if content_type.starts_with(JSON_MIMETYPE) {
                match serde_json::from_slice::<JsonValue>(&body) {
                    Ok(parsed) => {
                        parameters.insert("body".to_string(), parsed);
                    }
                    Err(err) => {
                        return store_error_response(&StoreError::InvalidArgument(format!(
                            "invalid JSON body: {}",
                            err
                        )))
                    }
                }
            } else if content_type.starts_with("application/x-www-form-urlencoded") {
                let text = String::from_utf8_lossy(&body);
                for (key, value) in parse_form(&text) {
                    parameters.insert(key, json!(value));
                }
            } else {
                parameters.insert("body".to_string(), encode_bytes(&body));
            }
        }
    }

    let asset_path = match parameters.remove("asset") {
        Some(value) => value
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| gateway.config.default_asset.clone()),
        None => gateway.config.default_asset.clone(),
    };

    tracing::debug!(%request_id, asset = %asset_path, "gateway request");

    let mut context = gateway.context();
    context.set_mimetype(JSON_MIMETYPE);

    let asset = match gateway.store.acquire(&context, &asset_path) {
        Ok(asset) => asset,
        Err(err) => {
            tracing::info!(%request_id, error = %err, "acquire failed");
            return store_error_response(&err);
        }
    };

    let updated = asset.update(&mut context, parameters);
    let result = updated
        .get_result()
        .unwrap_or_else(|| CallResult::error("update produced no result"));

    match result {
        CallResult::Error(error) => {
            tracing::info!(%request_id, error = %error.message, "action failed");
            call_error_response(&error)
        }
        CallResult::Valid(value) => {
            let mimetype = context.mimetype().unwrap_or(JSON_MIMETYPE).to_string();
            if mimetype == JSON_MIMETYPE {
                return Json(value).into_response();
            }
            // non-JSON reply: write the raw return value under the
            // action-provided content type
            let payload = match &value {
                JsonValue::String(text) => text.clone().into_bytes(),
                other => other.to_string().into_bytes(),
            };
            ([(header::CONTENT_TYPE, mimetype)], payload).into_response()
        }
    }
}

pub fn router(gateway: Arc<Gateway>) -> Router {
    let body_limit = gateway.config.max_body_size;
    Router::new()
        .route("/", get(process).post(process))
        .layer(DefaultBodyLimit::max(body_limit + 1))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Bind and serve until shutdown. A failure to bind surfaces as a backend
/// error so the binary can exit non-zero.
pub async fn serve(gateway: Arc<Gateway>, host: &str, port: u16) -> crate::core::Result<()> {
    let address = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| StoreError::Backend(format!("failed to bind {}: {}", address, e)))?;
    tracing::info!(%address, "gateway listening");

    axum::serve(listener, router(gateway))
        .await
        .map_err(|e| StoreError::Backend(format!("server error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form_decodes_pairs() {
        let pairs = parse_form("a=1&b=hello+world&c=%2Ftmp%2Fx&flag");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "hello world".to_string()),
                ("c".to_string(), "/tmp/x".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }
}
