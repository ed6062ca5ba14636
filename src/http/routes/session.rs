use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::application::todo_service::TodoService;
use crate::domain::user::Credentials;
use crate::http::routes::todos::AppState;
use crate::http::types::ApiError;

pub fn router<S: TodoService + Clone>(state: AppState<S>) -> Router {
    Router::new()
        .route("/session", get(current::<S>).post(sign_in::<S>).delete(sign_out::<S>))
        .with_state(state)
}

async fn current<S: TodoService>(State(state): State<AppState<S>>) -> Result<Json<Value>, ApiError> {
    let user = state.service.current_user().await.ok_or_else(ApiError::unauthorized)?;
    Ok(Json(json!({ "user": user, "displayName": user.display_name() })))
}

/// Signs in and loads the list, mirroring the login screen handing over to the list view.
async fn sign_in<S: TodoService>(State(state): State<AppState<S>>, Json(credentials): Json<Credentials>) -> Result<Json<Value>, ApiError> {
    let user = state.service.sign_in(credentials).await?;
    if let Err(e) = state.service.refresh().await {
        tracing::warn!(error = %e, "initial todo load failed");
    }
    Ok(Json(json!({ "user": user, "displayName": user.display_name() })))
}

async fn sign_out<S: TodoService>(State(state): State<AppState<S>>) -> Result<StatusCode, ApiError> {
    state.service.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}
