use std::sync::Arc;

use axum::{routing::get, Router};

use crate::application::todo_service::TodoService;
use crate::http::routes::{files, session, todos::{self, AppState}};
use crate::infrastructure::local_store::LocalObjectStore;

pub fn app<S: TodoService + Clone>(state: AppState<S>, store: Arc<LocalObjectStore>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(session::router(state.clone()))
        .merge(todos::router(state))
        .merge(files::router(store))
}
