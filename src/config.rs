use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::application::todo_service::{Settings, TodoOrchestrator, SIGNED_URL_TTL_SECS};
use crate::domain::gateways::{NotificationDispatcher, TodoGateway};
use crate::domain::user::User;
use crate::infrastructure::{
    graphql_gateway::GraphQlTodoGateway,
    identity::StaticIdentityProvider,
    local_store::LocalObjectStore,
    notifier::{FunctionNotifier, LogNotifier},
    sqlite_gateway::SqliteTodoGateway,
};

#[derive(Debug, Clone)]
pub enum DataBackend {
    Sqlite { database_url: String },
    GraphQl { endpoint: String, api_key: Option<String> },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: DataBackend,
    pub bind_addr: SocketAddr,
    pub storage_dir: PathBuf,
    pub storage_base_url: String,
    pub storage_signing_key: String,
    pub notify_function_url: Option<String>,
    pub notify_recipient: Option<String>,
    pub account: User,
    pub password: String,
}

fn var(name: &str) -> Option<String> { env::var(name).ok().filter(|v| !v.trim().is_empty()) }

impl AppConfig {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let backend = match var("GRAPHQL_ENDPOINT") {
            Some(endpoint) => DataBackend::GraphQl { endpoint, api_key: var("GRAPHQL_API_KEY") },
            None => DataBackend::Sqlite {
                database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite://todos.db".to_string()),
            },
        };
        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse()
            .context("BIND_ADDR must be a socket address")?;
        let storage_base_url = var("STORAGE_BASE_URL").unwrap_or_else(|| format!("http://{bind_addr}"));
        let username = var("APP_USERNAME").unwrap_or_else(|| "demo".to_string());

        Ok(Self {
            backend,
            bind_addr,
            storage_dir: var("STORAGE_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("storage")),
            storage_base_url,
            storage_signing_key: var("STORAGE_SIGNING_KEY").unwrap_or_else(|| "dev-signing-key".to_string()),
            notify_function_url: var("NOTIFY_FUNCTION_URL"),
            notify_recipient: var("NOTIFY_RECIPIENT"),
            account: User { username, name: var("APP_USER_NAME"), email: var("APP_USER_EMAIL") },
            password: var("APP_PASSWORD").unwrap_or_else(|| "demo".to_string()),
        })
    }

    pub fn describe_backend(&self) -> String {
        match &self.backend {
            DataBackend::Sqlite { database_url } => database_url.clone(),
            DataBackend::GraphQl { endpoint, .. } => endpoint.clone(),
        }
    }
}

/// Everything the presentation shells need, wired from configuration.
pub struct Wiring {
    pub service: TodoOrchestrator,
    pub store: Arc<LocalObjectStore>,
}

pub async fn wire(config: &AppConfig, signed_in: bool) -> anyhow::Result<Wiring> {
    let gateway: Arc<dyn TodoGateway> = match &config.backend {
        DataBackend::Sqlite { database_url } => {
            prepare_sqlite_file(database_url)?;
            let gateway = SqliteTodoGateway::connect(database_url).await?;
            gateway.init().await?;
            Arc::new(gateway)
        }
        DataBackend::GraphQl { endpoint, api_key } => Arc::new(GraphQlTodoGateway::new(endpoint.clone(), api_key.clone())),
    };
    let store = Arc::new(LocalObjectStore::new(&config.storage_dir, &config.storage_base_url, &config.storage_signing_key));
    let notifier: Arc<dyn NotificationDispatcher> = match &config.notify_function_url {
        Some(url) => Arc::new(FunctionNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };
    let identity = StaticIdentityProvider::new(config.account.clone(), config.password.clone());
    let identity = if signed_in { identity.signed_in() } else { identity };

    let settings = Settings { notify_recipient: config.notify_recipient.clone(), signed_url_ttl_secs: SIGNED_URL_TTL_SECS };
    let service = TodoOrchestrator::new(gateway, store.clone(), notifier, Arc::new(identity)).with_settings(settings);
    Ok(Wiring { service, store })
}

/// Makes sure a file-backed SQLite URL points at a file that can be opened.
pub fn prepare_sqlite_file(database_url: &str) -> anyhow::Result<()> {
    if database_url.starts_with("sqlite::memory:") { return Ok(()); }
    if let Some(path) = database_url.strip_prefix("sqlite://") {
        // On Windows, absolute paths may look like /C:/path; strip the leading slash
        let path = if cfg!(windows) && path.len() >= 3 && path.as_bytes()[0] == b'/' && path.as_bytes()[2] == b':' {
            &path[1..]
        } else {
            path
        };
        use std::{fs, fs::OpenOptions, path::Path};
        let p = Path::new(path);
        if let Some(parent) = p.parent() { if !parent.as_os_str().is_empty() { fs::create_dir_all(parent)?; } }
        if !p.exists() {
            let _ = OpenOptions::new().create(true).append(true).open(p)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_urls_need_no_file() {
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
    }

    #[test]
    fn file_urls_create_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested/todos.db");
        prepare_sqlite_file(&format!("sqlite://{}", db.display())).unwrap();
        assert!(db.exists());
    }
}
