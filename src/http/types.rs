use axum::response::{IntoResponse, Response};
use base64::Engine;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::domain::error::{GatewayError, IdentityError, TodoError};
use crate::domain::todo::{NewAttachment, TodoView};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self { Self { status, message: message.into() } }

    pub fn bad_request(message: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, message) }

    pub fn unauthorized() -> Self { Self::new(StatusCode::UNAUTHORIZED, "sign in required") }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, axum::Json(ErrorBody { message: &self.message })).into_response()
    }
}

impl From<TodoError> for ApiError {
    fn from(e: TodoError) -> Self {
        let status = match &e {
            TodoError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TodoError::Policy(_) => StatusCode::CONFLICT,
            TodoError::Gateway(GatewayError::NotFound(_)) => StatusCode::NOT_FOUND,
            TodoError::Identity(IdentityError::InvalidCredentials | IdentityError::NotSignedIn) => StatusCode::UNAUTHORIZED,
            TodoError::Gateway(_) | TodoError::Upload(_) | TodoError::OrphanedAttachment { .. } | TodoError::DanglingReference { .. } => {
                StatusCode::BAD_GATEWAY
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %e, "request failed");
        }
        Self::new(status, e.to_string())
    }
}

/// Attachment sent inline as base64.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    pub name: String,
    pub content_base64: String,
}

impl TryFrom<FilePayload> for NewAttachment {
    type Error = ApiError;

    fn try_from(p: FilePayload) -> Result<Self, Self::Error> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(p.content_base64.as_bytes())
            .map_err(|e| ApiError::bad_request(format!("file content is not valid base64: {e}")))?;
        Ok(NewAttachment { file_name: p.name, bytes })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoBody {
    #[serde(flatten)]
    pub view: TodoView,
    pub completed_label: Option<String>,
}

impl From<TodoView> for TodoBody {
    fn from(view: TodoView) -> Self {
        let completed_label = view.completion_label();
        Self { view, completed_label }
    }
}
