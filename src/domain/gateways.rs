use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{GatewayError, IdentityError, NotificationError, StorageError};
use super::todo::{NewTodo, Todo, TodoId, TodoPatch};
use super::user::{Credentials, User};

/// Authoritative store of todo records.
#[async_trait]
pub trait TodoGateway: Send + Sync + 'static {
    async fn list(&self) -> Result<Vec<Todo>, GatewayError>;
    async fn get(&self, id: &TodoId) -> Result<Todo, GatewayError>;
    async fn create(&self, input: NewTodo) -> Result<Todo, GatewayError>;
    async fn update(&self, patch: TodoPatch) -> Result<Todo, GatewayError>;
    async fn delete(&self, id: &TodoId) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn prefix(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }
}

/// Key-addressed blob storage for attachments.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Stores `bytes` under `key`, replacing any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>, visibility: Visibility) -> Result<String, StorageError>;
    /// Time-limited read URL; fails when the object does not exist.
    async fn signed_url(&self, key: &str, ttl_secs: u64) -> Result<String, StorageError>;
    async fn delete(&self, key: &str, visibility: Visibility) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync + 'static {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn current_user(&self) -> Option<User>;
    async fn sign_in(&self, credentials: Credentials) -> Result<User, IdentityError>;
    async fn sign_out(&self) -> Result<(), IdentityError>;
}
