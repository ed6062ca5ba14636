use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::application::todo_service::TodoService;
use crate::domain::filter::filter_view;
use crate::domain::todo::{FilterType, NewAttachment, TodoDraft, TodoEdit, TodoId, TodoView};
use crate::http::types::{ApiError, FilePayload, TodoBody};

#[derive(Clone)]
pub struct AppState<S: TodoService> { pub service: S }

pub fn router<S: TodoService + Clone>(state: AppState<S>) -> Router {
    Router::new()
        .route("/todos", get(list_todos::<S>).post(create_todo::<S>))
        .route("/todos/refresh", post(refresh_todos::<S>))
        .route("/todos/:id", put(update_todo::<S>).delete(delete_todo::<S>))
        .route("/todos/:id/toggle", post(toggle_todo::<S>))
        .with_state(state)
}

async fn require_user<S: TodoService>(service: &S) -> Result<(), ApiError> {
    service.current_user().await.map(|_| ()).ok_or_else(ApiError::unauthorized)
}

#[derive(Deserialize)]
struct ListQuery { search: Option<String>, filter: Option<String> }

/// Filters the cached list by the request's own query; omitted parameters
/// mean no search and `all`. Nothing is stored between requests.
async fn list_todos<S: TodoService>(State(state): State<AppState<S>>, Query(q): Query<ListQuery>) -> Result<Json<Value>, ApiError> {
    require_user(&state.service).await?;
    let filter = match q.filter {
        Some(filter) => filter.parse::<FilterType>().map_err(ApiError::bad_request)?,
        None => FilterType::default(),
    };
    let search = q.search.unwrap_or_default();
    let snapshot = state.service.snapshot().await;
    let items = filter_view(&snapshot.todos, &search, filter);
    Ok(Json(json!({
        "items": bodies(items),
        "search": search,
        "filter": filter,
        "total": snapshot.todos.len(),
    })))
}

async fn refresh_todos<S: TodoService>(State(state): State<AppState<S>>) -> Result<Json<Value>, ApiError> {
    require_user(&state.service).await?;
    state.service.refresh().await?;
    Ok(Json(json!({ "items": bodies(state.service.visible().await) })))
}

#[derive(Deserialize)]
struct CreateBody { name: String, description: String, file: Option<FilePayload> }

async fn create_todo<S: TodoService>(State(state): State<AppState<S>>, Json(payload): Json<CreateBody>) -> Result<Json<Value>, ApiError> {
    require_user(&state.service).await?;
    let file = payload.file.map(NewAttachment::try_from).transpose()?;
    let todo = state.service.create(TodoDraft { name: payload.name, description: payload.description, file }).await?;
    Ok(Json(json!(todo)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody { name: String, description: String, new_file: Option<FilePayload> }

async fn update_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>, Json(payload): Json<UpdateBody>) -> Result<Json<Value>, ApiError> {
    require_user(&state.service).await?;
    let current = state.service.get(&TodoId(id)).await?;
    let edit = TodoEdit {
        name: payload.name,
        description: payload.description,
        new_file: payload.new_file.map(NewAttachment::try_from).transpose()?,
        ..TodoEdit::from(&current)
    };
    let outcome = state.service.update(edit).await?;
    Ok(Json(json!(outcome)))
}

async fn toggle_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    require_user(&state.service).await?;
    let current = state.service.get(&TodoId(id)).await?;
    let outcome = state.service.toggle_done(&current).await?;
    Ok(Json(json!({ "todo": outcome.todo, "notified": outcome.notification.is_some() })))
}

async fn delete_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    require_user(&state.service).await?;
    let outcome = state.service.delete(&TodoId(id)).await?;
    Ok(Json(json!(outcome)))
}

fn bodies(items: Vec<TodoView>) -> Vec<TodoBody> { items.into_iter().map(TodoBody::from).collect() }
