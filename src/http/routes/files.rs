use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum::http::{header, StatusCode};
use serde::Deserialize;

use crate::domain::error::StorageError;
use crate::http::types::ApiError;
use crate::infrastructure::local_store::LocalObjectStore;

/// Serves attachments behind the signed URLs handed out on refresh.
pub fn router(store: Arc<LocalObjectStore>) -> Router {
    Router::new().route("/files/*key", get(serve)).with_state(store)
}

#[derive(Deserialize)]
struct Signed { expires: i64, signature: String }

async fn serve(State(store): State<Arc<LocalObjectStore>>, Path(key): Path<String>, Query(signed): Query<Signed>) -> Result<Response, ApiError> {
    let path = store.verify(&key, signed.expires, &signed.signature).map_err(|_| ApiError::new(StatusCode::FORBIDDEN, "invalid or expired link"))?;
    let bytes = store.read(&path).await.map_err(|e| match e {
        StorageError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, "Not found"),
        other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;
    Ok(([(header::CONTENT_TYPE, content_type(&key))], bytes).into_response())
}

fn content_type(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
