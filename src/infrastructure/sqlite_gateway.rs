use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::{SqlitePoolOptions, SqliteRow}, Pool, Row, Sqlite};
use uuid::Uuid;

use crate::domain::{
    error::GatewayError,
    gateways::TodoGateway,
    todo::{NewTodo, Todo, TodoId, TodoPatch},
};

/// Self-hosted data gateway backed by SQLite.
#[derive(Clone)]
pub struct SqliteTodoGateway {
    pool: Arc<Pool<Sqlite>>,
}

const COLUMNS: &str = "id, name, description, done, file, updated_at";

impl SqliteTodoGateway {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options = if database_url.starts_with("sqlite::memory:") {
            // Every connection to `sqlite::memory:` opens its own database; keep exactly one alive.
            SqlitePoolOptions::new().max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(database_url).await?;
        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS todos (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                done INTEGER NOT NULL DEFAULT 0,
                file TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(&self, id: &TodoId) -> Result<Option<Todo>, GatewayError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM todos WHERE id = ?1"))
            .bind(&id.0)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error)?;
        row.map(row_to_todo).transpose()
    }
}

#[async_trait]
impl TodoGateway for SqliteTodoGateway {
    async fn list(&self) -> Result<Vec<Todo>, GatewayError> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM todos ORDER BY created_at DESC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(db_error)?;
        rows.into_iter().map(row_to_todo).collect()
    }

    async fn get(&self, id: &TodoId) -> Result<Todo, GatewayError> {
        self.fetch(id).await?.ok_or_else(|| GatewayError::NotFound(id.clone()))
    }

    async fn create(&self, input: NewTodo) -> Result<Todo, GatewayError> {
        let now = Utc::now();
        let id = TodoId(Uuid::new_v4().to_string());
        sqlx::query(
            "INSERT INTO todos (id, name, description, done, file, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&id.0)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.done)
        .bind(&input.file)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;
        Ok(Todo { id, name: input.name, description: input.description, done: input.done, file: input.file, updated_at: now })
    }

    async fn update(&self, patch: TodoPatch) -> Result<Todo, GatewayError> {
        let Some(mut todo) = self.fetch(&patch.id).await? else { return Err(GatewayError::NotFound(patch.id)) };

        if let Some(n) = patch.name { todo.name = n; }
        if let Some(d) = patch.description { todo.description = d; }
        if let Some(d) = patch.done { todo.done = d; }
        if let Some(f) = patch.file { todo.file = Some(f); }
        todo.updated_at = Utc::now();

        sqlx::query("UPDATE todos SET name = ?2, description = ?3, done = ?4, file = ?5, updated_at = ?6 WHERE id = ?1")
            .bind(&todo.id.0)
            .bind(&todo.name)
            .bind(&todo.description)
            .bind(todo.done)
            .bind(&todo.file)
            .bind(todo.updated_at.to_rfc3339())
            .execute(&*self.pool)
            .await
            .map_err(db_error)?;

        Ok(todo)
    }

    async fn delete(&self, id: &TodoId) -> Result<(), GatewayError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?1")
            .bind(&id.0)
            .execute(&*self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() > 0 { Ok(()) } else { Err(GatewayError::NotFound(id.clone())) }
    }
}

fn db_error(e: sqlx::Error) -> GatewayError {
    match e {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => GatewayError::Decode(e.to_string()),
        e => GatewayError::Transport(e.to_string()),
    }
}

fn row_to_todo(row: SqliteRow) -> Result<Todo, GatewayError> {
    let updated_at_str: String = row.try_get("updated_at").map_err(db_error)?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map_err(|e| GatewayError::Decode(format!("updated_at `{updated_at_str}`: {e}")))?
        .with_timezone(&Utc);

    Ok(Todo {
        id: TodoId(row.try_get("id").map_err(db_error)?),
        name: row.try_get("name").map_err(db_error)?,
        description: row.try_get("description").map_err(db_error)?,
        done: row.try_get("done").map_err(db_error)?,
        file: row.try_get("file").map_err(db_error)?,
        updated_at,
    })
}
