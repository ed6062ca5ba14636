use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::Router;
use serde_json::{json, Value};
use todoboard::application::todo_service::{Settings, TodoOrchestrator};
use todoboard::domain::error::NotificationError;
use todoboard::domain::gateways::{Notification, NotificationDispatcher};
use todoboard::domain::user::User;
use todoboard::http::{routes::todos::AppState, routing};
use todoboard::infrastructure::{identity::StaticIdentityProvider, local_store::LocalObjectStore, sqlite_gateway::SqliteTodoGateway};

#[derive(Clone, Default)]
struct Outbox(Arc<Mutex<Vec<Notification>>>);

#[async_trait]
impl NotificationDispatcher for Outbox {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        self.0.lock().unwrap().push(notification);
        Ok(())
    }
}

async fn app(storage: &tempfile::TempDir, outbox: Outbox) -> Router {
    // use in-memory sqlite for tests
    let gateway = SqliteTodoGateway::connect("sqlite::memory:").await.unwrap();
    gateway.init().await.unwrap();
    let store = Arc::new(LocalObjectStore::new(storage.path(), "http://localhost:3000", "test-key"));
    let account = User { username: "asha".into(), name: Some("Asha".into()), email: Some("asha@example.com".into()) };
    let identity = StaticIdentityProvider::new(account, "hunter2");
    let service = TodoOrchestrator::new(Arc::new(gateway), store.clone(), Arc::new(outbox), Arc::new(identity))
        .with_settings(Settings::default());
    routing::app(AppState { service }, store)
}

async fn sign_in(app: &Router) {
    let res = request(app, "POST", "/session", Some(json!({ "username": "asha", "password": "hunter2" }))).await;
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn acceptance_create_list_toggle_update_delete() {
    let storage = tempfile::tempdir().unwrap();
    let outbox = Outbox::default();
    let app = app(&storage, outbox.clone()).await;

    // todo routes sit behind the login
    let res = request(&app, "GET", "/todos", None).await;
    assert_eq!(res.status(), 401);
    sign_in(&app).await;

    // create with an attachment
    let payload = json!({ "name": "Buy milk", "description": "2%", "file": { "name": "milk.png", "contentBase64": "iVBORw0K" } });
    let res = request(&app, "POST", "/todos", Some(payload)).await;
    assert_eq!(res.status(), 200);
    let body = json_body(res).await;
    let id = body["id"].as_str().unwrap().to_string();
    let key = body["file"].as_str().unwrap().to_string();
    assert!(key.starts_with("todos/") && key.ends_with("-milk.png"));
    assert!(storage.path().join("public").join(&key).exists());

    let res = request(&app, "POST", "/todos", Some(json!({ "name": "Walk dog", "description": "evening" }))).await;
    assert_eq!(res.status(), 200);

    // list carries a signed url that the file route honours
    let res = request(&app, "GET", "/todos?search=MILK", None).await;
    assert_eq!(res.status(), 200);
    let body = json_body(res).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(body["total"], 2);
    let url = items[0]["fileUrl"].as_str().unwrap();
    let path = url.strip_prefix("http://localhost:3000").unwrap();
    let res = request(&app, "GET", path, None).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "image/png");
    let res = request(&app, "GET", &path.replace("signature=", "signature=00"), None).await;
    assert_eq!(res.status(), 403);

    // update replaces the attachment
    let payload = json!({ "name": "Buy oat milk", "description": "1 litre", "newFile": { "name": "oat.png", "contentBase64": "iVBORw0K" } });
    let res = request(&app, "PUT", &format!("/todos/{id}"), Some(payload)).await;
    assert_eq!(res.status(), 200);
    let body = json_body(res).await;
    assert_eq!(body["todo"]["name"], "Buy oat milk");
    assert!(body["todo"]["file"].as_str().unwrap().ends_with("-oat.png"));
    assert!(!storage.path().join("public").join(&key).exists());

    // toggle to done notifies once
    let res = request(&app, "POST", &format!("/todos/{id}/toggle"), None).await;
    assert_eq!(res.status(), 200);
    let body = json_body(res).await;
    assert_eq!(body["todo"]["done"], true);
    assert_eq!(body["notified"], true);
    wait_for_outbox(&outbox, 1).await;
    assert!(outbox.0.lock().unwrap()[0].body.contains("'Buy oat milk'"));

    // completed todos are read-only
    let res = request(&app, "DELETE", &format!("/todos/{id}"), None).await;
    assert_eq!(res.status(), 409);
    let res = request(&app, "GET", "/todos?search=&filter=completed", None).await;
    let body = json_body(res).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(body["items"][0]["completedLabel"].is_string());
    // query parameters do not stick to later requests
    let res = request(&app, "GET", "/todos", None).await;
    let body = json_body(res).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["filter"], "all");

    // undo then delete
    let res = request(&app, "POST", &format!("/todos/{id}/toggle"), None).await;
    assert_eq!(json_body(res).await["notified"], false);
    let res = request(&app, "DELETE", &format!("/todos/{id}"), None).await;
    assert_eq!(res.status(), 200);
    assert_eq!(json_body(res).await["attachment"]["status"], "removed");

    // gone
    let res = request(&app, "DELETE", &format!("/todos/{id}"), None).await;
    assert_eq!(res.status(), 404);
    assert_eq!(outbox.0.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn acceptance_validation_and_session() {
    let storage = tempfile::tempdir().unwrap();
    let app = app(&storage, Outbox::default()).await;

    let res = request(&app, "POST", "/session", Some(json!({ "username": "asha", "password": "wrong" }))).await;
    assert_eq!(res.status(), 401);
    sign_in(&app).await;

    let res = request(&app, "GET", "/session", None).await;
    assert_eq!(json_body(res).await["displayName"], "Asha");

    let res = request(&app, "POST", "/todos", Some(json!({ "name": "", "description": "x" }))).await;
    assert_eq!(res.status(), 422);
    assert_eq!(json_body(res).await["message"], "Title is required.");
    let res = request(&app, "POST", "/todos", Some(json!({ "name": " ", "description": "" }))).await;
    assert_eq!(json_body(res).await["message"], "Title and description are required.");
    let res = request(&app, "GET", "/todos?filter=done", None).await;
    assert_eq!(res.status(), 400);

    let res = request(&app, "DELETE", "/session", None).await;
    assert_eq!(res.status(), 204);
    let res = request(&app, "GET", "/todos", None).await;
    assert_eq!(res.status(), 401);
}

async fn wait_for_outbox(outbox: &Outbox, n: usize) {
    for _ in 0..50 {
        if outbox.0.lock().unwrap().len() >= n { return; }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("notification not delivered");
}

async fn json_body(res: hyper::Response<axum::body::Body>) -> Value {
    serde_json::from_slice(&to_bytes(res.into_body(), 1024 * 1024).await.unwrap()).unwrap()
}

async fn request(app: &Router, method: &str, path: &str, body: Option<serde_json::Value>) -> hyper::Response<axum::body::Body> {
    use axum::body::Body;
    use axum::http::{Request, Method};
    use tower::ServiceExt;

    let req = Request::builder().method(Method::from_bytes(method.as_bytes()).unwrap()).uri(path);
    let req = match body {
        Some(json) => req.header("content-type", "application/json").body(Body::from(json.to_string())).unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(req).await.unwrap()
}
