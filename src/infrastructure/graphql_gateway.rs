//! Client for the managed GraphQL todo API.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::{
    error::GatewayError,
    gateways::TodoGateway,
    todo::{NewTodo, Todo, TodoId, TodoPatch},
};

const TODO_FIELDS: &str = "id name description done file updatedAt";

#[derive(Clone)]
pub struct GraphQlTodoGateway {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

#[derive(Deserialize)]
struct Connection {
    items: Vec<Option<Todo>>,
}

impl GraphQlTodoGateway {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self { client: Client::new(), endpoint: endpoint.into(), api_key }
    }

    /// Runs one operation and decodes `data.<field>`.
    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value, field: &str) -> Result<T, GatewayError> {
        let mut request = self.client.post(&self.endpoint).json(&json!({ "query": query, "variables": variables }));
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Remote(format!("status {}: {}", status.as_u16(), body)));
        }

        let body: GraphQlResponse = response.json().await.map_err(http_error)?;
        if !body.errors.is_empty() {
            let messages: Vec<_> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(GatewayError::Remote(messages.join("; ")));
        }
        let value = body
            .data
            .and_then(|mut d| d.get_mut(field).map(Value::take))
            .ok_or_else(|| GatewayError::Decode(format!("response has no `{field}`")))?;
        serde_json::from_value(value).map_err(|e| GatewayError::Decode(format!("{field}: {e}")))
    }
}

fn http_error(e: reqwest::Error) -> GatewayError {
    if e.is_decode() { GatewayError::Decode(e.to_string()) } else { GatewayError::Transport(e.to_string()) }
}

#[async_trait]
impl TodoGateway for GraphQlTodoGateway {
    async fn list(&self) -> Result<Vec<Todo>, GatewayError> {
        let query = format!("query ListTodos {{ listTodos {{ items {{ {TODO_FIELDS} }} }} }}");
        let connection: Connection = self.execute(&query, json!({}), "listTodos").await?;
        Ok(connection.items.into_iter().flatten().collect())
    }

    async fn get(&self, id: &TodoId) -> Result<Todo, GatewayError> {
        let query = format!("query GetTodo($id: ID!) {{ getTodo(id: $id) {{ {TODO_FIELDS} }} }}");
        let todo: Option<Todo> = self.execute(&query, json!({ "id": id }), "getTodo").await?;
        todo.ok_or_else(|| GatewayError::NotFound(id.clone()))
    }

    async fn create(&self, input: NewTodo) -> Result<Todo, GatewayError> {
        let query = format!(
            "mutation CreateTodo($input: CreateTodoInput!) {{ createTodo(input: $input) {{ {TODO_FIELDS} }} }}"
        );
        self.execute(&query, json!({ "input": input }), "createTodo").await
    }

    async fn update(&self, patch: TodoPatch) -> Result<Todo, GatewayError> {
        let id = patch.id.clone();
        let query = format!(
            "mutation UpdateTodo($input: UpdateTodoInput!) {{ updateTodo(input: $input) {{ {TODO_FIELDS} }} }}"
        );
        let todo: Option<Todo> = self.execute(&query, json!({ "input": patch }), "updateTodo").await?;
        todo.ok_or(GatewayError::NotFound(id))
    }

    async fn delete(&self, id: &TodoId) -> Result<(), GatewayError> {
        let query = "mutation DeleteTodo($input: DeleteTodoInput!) { deleteTodo(input: $input) { id } }";
        let deleted: Option<Value> = self.execute(query, json!({ "input": { "id": id } }), "deleteTodo").await?;
        deleted.map(|_| ()).ok_or_else(|| GatewayError::NotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn todo_json(id: &str, done: bool) -> Value {
        json!({ "id": id, "name": "Buy milk", "description": "2%", "done": done, "file": null, "updatedAt": "2025-03-02T10:35:00.000Z" })
    }

    #[tokio::test]
    async fn list_sends_api_key_and_decodes_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "da2-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "listTodos": { "items": [todo_json("1", false), null, todo_json("2", true)] } }
            })))
            .mount(&server)
            .await;

        let gw = GraphQlTodoGateway::new(server.uri(), Some("da2-test".into()));
        let todos = gw.list().await.unwrap();
        assert_eq!(todos.len(), 2);
        assert_eq!(todos[1].id, TodoId::from("2"));
        assert!(todos[1].done);
    }

    #[tokio::test]
    async fn get_null_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "getTodo": null } })))
            .mount(&server)
            .await;

        let gw = GraphQlTodoGateway::new(server.uri(), None);
        assert!(matches!(gw.get(&TodoId::from("x")).await, Err(GatewayError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_sends_only_present_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "input": { "id": "1", "done": true } } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "updateTodo": todo_json("1", true) } })))
            .mount(&server)
            .await;

        let gw = GraphQlTodoGateway::new(server.uri(), None);
        let patch = TodoPatch { done: Some(true), ..TodoPatch::new(TodoId::from("1")) };
        assert!(gw.update(patch).await.unwrap().done);
    }

    #[tokio::test]
    async fn graphql_errors_surface_as_remote() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null, "errors": [{ "message": "Not Authorized to access createTodo" }]
            })))
            .mount(&server)
            .await;

        let gw = GraphQlTodoGateway::new(server.uri(), None);
        let input = NewTodo { name: "a".into(), description: "b".into(), file: None, done: false };
        match gw.create(input).await {
            Err(GatewayError::Remote(msg)) => assert!(msg.contains("Not Authorized")),
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn http_failure_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(503)).mount(&server).await;
        let gw = GraphQlTodoGateway::new(server.uri(), None);
        assert!(matches!(gw.delete(&TodoId::from("1")).await, Err(GatewayError::Remote(_))));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_and_unreachable_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200).set_body_string("<html>")).mount(&server).await;
        let gw = GraphQlTodoGateway::new(server.uri(), None);
        assert!(matches!(gw.list().await, Err(GatewayError::Decode(_))));

        let gw = GraphQlTodoGateway::new("http://127.0.0.1:1/graphql", None);
        assert!(matches!(gw.list().await, Err(GatewayError::Transport(_))));
    }
}
