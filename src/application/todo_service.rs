//! Todo list orchestration: the in-memory list, its derived views, and the
//! multi-step workflows that keep the data gateway and object store in step.
//!
//! The cached records are only ever replaced by [`TodoOrchestrator::refresh`];
//! every mutating workflow writes through the gateways and then refetches
//! the whole list. Concurrent refreshes are last-write-wins.
//!
//! Signed attachment URLs expire; reads re-sign the cached views once the
//! URLs from the last hydration are about to lapse.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::domain::error::{GatewayError, PolicyError, TodoError};
use crate::domain::filter::filter_view;
use crate::domain::gateways::{IdentityProvider, Notification, NotificationDispatcher, ObjectStore, TodoGateway, Visibility};
use crate::domain::todo::{
    attachment_key, removal_key, validate, FilterType, NewAttachment, NewTodo, Todo, TodoDraft, TodoEdit, TodoId, TodoPatch, TodoView,
};
use crate::domain::user::{display_name, Credentials, User};

pub const SIGNED_URL_TTL_SECS: u64 = 3600;
pub const COMPLETION_SUBJECT: &str = "Todo completion update";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoListState {
    pub todos: Vec<TodoView>,
    pub search_query: String,
    pub filter_type: FilterType,
    pub editing: Option<TodoId>,
    /// When the signed URLs in `todos` were issued.
    #[serde(skip)]
    pub hydrated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Fixed recipient for completion mails; the signed-in user's email otherwise.
    pub notify_recipient: Option<String>,
    pub signed_url_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self { Self { notify_recipient: None, signed_url_ttl_secs: SIGNED_URL_TTL_SECS } }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "key")]
pub enum AttachmentCleanup {
    NotNeeded,
    Removed(String),
    /// Removal failed; the object is left behind unreferenced.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub attachment: AttachmentCleanup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub todo: Todo,
    /// Previous attachment that could not be removed after a replacement.
    pub stale_attachment: Option<String>,
}

#[derive(Debug)]
pub struct ToggleOutcome {
    pub todo: Todo,
    /// Detached completion notification, present only on a false -> true
    /// transition with a known recipient. Dropping it does not cancel it.
    pub notification: Option<JoinHandle<()>>,
}

#[async_trait]
pub trait TodoService: Send + Sync + 'static {
    async fn refresh(&self) -> Result<(), TodoError>;
    async fn create(&self, draft: TodoDraft) -> Result<Todo, TodoError>;
    async fn update(&self, edit: TodoEdit) -> Result<UpdateOutcome, TodoError>;
    async fn toggle_done(&self, todo: &Todo) -> Result<ToggleOutcome, TodoError>;
    async fn delete(&self, id: &TodoId) -> Result<DeleteOutcome, TodoError>;
    async fn get(&self, id: &TodoId) -> Result<Todo, TodoError>;

    async fn visible(&self) -> Vec<TodoView>;
    async fn snapshot(&self) -> TodoListState;
    async fn set_search(&self, query: String);
    async fn set_filter(&self, filter: FilterType);
    async fn begin_edit(&self, id: &TodoId) -> Result<TodoEdit, TodoError>;
    async fn cancel_edit(&self);

    async fn current_user(&self) -> Option<User>;
    async fn sign_in(&self, credentials: Credentials) -> Result<User, TodoError>;
    async fn sign_out(&self) -> Result<(), TodoError>;
}

#[derive(Clone)]
pub struct TodoOrchestrator {
    gateway: Arc<dyn TodoGateway>,
    store: Arc<dyn ObjectStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    identity: Arc<dyn IdentityProvider>,
    settings: Settings,
    state: Arc<RwLock<TodoListState>>,
}

impl TodoOrchestrator {
    pub fn new(
        gateway: Arc<dyn TodoGateway>,
        store: Arc<dyn ObjectStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self { gateway, store, notifier, identity, settings: Settings::default(), state: Arc::default() }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    async fn upload(&self, file: &NewAttachment) -> Result<String, TodoError> {
        let key = attachment_key(Utc::now(), &file.file_name);
        let stored = self.store.put(&key, file.bytes.clone(), Visibility::Public).await.map_err(TodoError::Upload)?;
        tracing::debug!(key = %stored, size = file.bytes.len(), "attachment uploaded");
        Ok(stored)
    }

    /// A record whose object cannot be signed is kept, without a URL.
    async fn hydrate(&self, todo: Todo) -> TodoView {
        let Some(key) = todo.file.as_deref() else { return TodoView::without_url(todo) };
        match self.store.signed_url(key, self.settings.signed_url_ttl_secs).await {
            Ok(url) => TodoView { todo, file_url: Some(url) },
            Err(e) => {
                tracing::warn!(id = %todo.id, %key, error = %e, "attachment URL unavailable");
                TodoView::without_url(todo)
            }
        }
    }

    async fn hydrate_all(&self, todos: Vec<Todo>) -> Vec<TodoView> {
        join_all(todos.into_iter().map(|t| self.hydrate(t))).await
    }

    /// True once URLs issued at `issued` are within a tenth of their
    /// lifetime of expiring.
    fn urls_expiring(&self, issued: DateTime<Utc>) -> bool {
        let ttl_ms = i64::try_from(self.settings.signed_url_ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        (Utc::now() - issued).num_milliseconds() >= ttl_ms - ttl_ms / 10
    }

    /// Re-signs the cached views when their URLs are about to lapse. The
    /// records themselves are not refetched.
    async fn renew_urls(&self) {
        let (issued, todos) = {
            let state = self.state.read().await;
            match state.hydrated_at {
                Some(at) if self.urls_expiring(at) && state.todos.iter().any(|v| v.todo.file.is_some()) => {
                    (at, state.todos.iter().map(|v| v.todo.clone()).collect::<Vec<_>>())
                }
                _ => return,
            }
        };
        let signed_at = Utc::now();
        let views = self.hydrate_all(todos).await;
        let mut state = self.state.write().await;
        // A refresh that landed meanwhile already holds fresher data.
        if state.hydrated_at == Some(issued) {
            state.todos = views;
            state.hydrated_at = Some(signed_at);
            tracing::debug!("attachment URLs re-signed");
        }
    }

    /// Refresh after a committed write. The write stands even if the
    /// refetch fails, so the failure is only logged.
    async fn refresh_after_write(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "refresh after write failed; list is stale");
        }
    }

    /// Rejects edits the caller or the cache already knows to be of a
    /// completed todo, before any remote call.
    async fn ensure_editable(&self, id: &TodoId, done: bool) -> Result<(), PolicyError> {
        let cached_done = self.state.read().await.todos.iter().any(|v| &v.todo.id == id && v.todo.done);
        if done || cached_done { Err(PolicyError::CompletedNotEditable(id.clone())) } else { Ok(()) }
    }

    async fn completion_notice(&self, todo: &Todo) -> Option<Notification> {
        let user = self.identity.current_user().await;
        let recipient = self
            .settings
            .notify_recipient
            .clone()
            .or_else(|| user.as_ref().and_then(|u| u.email.clone()));
        let Some(recipient) = recipient else {
            tracing::warn!(id = %todo.id, "no recipient for completion notification; skipping");
            return None;
        };
        Some(Notification { recipient, subject: COMPLETION_SUBJECT.to_string(), body: completion_body(user.as_ref(), todo) })
    }

    fn dispatch(&self, notification: Notification) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let recipient = notification.recipient.clone();
            match notifier.send(notification).await {
                Ok(()) => tracing::info!(%recipient, "completion notification sent"),
                Err(e) => tracing::warn!(%recipient, error = %e, "completion notification failed"),
            }
        })
    }
}

pub fn completion_body(user: Option<&User>, todo: &Todo) -> String {
    format!(
        "Hello {}, Your Todo - '{}' with description - '{}' has been marked as completed successfully !",
        display_name(user),
        todo.name,
        todo.description
    )
}

#[async_trait]
impl TodoService for TodoOrchestrator {
    async fn refresh(&self) -> Result<(), TodoError> {
        let todos = self.gateway.list().await?;
        let signed_at = Utc::now();
        let views = self.hydrate_all(todos).await;
        tracing::debug!(count = views.len(), "todo list refreshed");
        let mut state = self.state.write().await;
        state.todos = views;
        state.hydrated_at = Some(signed_at);
        Ok(())
    }

    async fn create(&self, draft: TodoDraft) -> Result<Todo, TodoError> {
        validate(&draft.name, &draft.description)?;
        let file = match &draft.file {
            Some(f) => Some(self.upload(f).await?),
            None => None,
        };
        let input = NewTodo { name: draft.name, description: draft.description, file: file.clone(), done: false };
        let created = self.gateway.create(input).await.map_err(|source| match file {
            Some(key) => TodoError::OrphanedAttachment { key, dangling: None, source },
            None => TodoError::Gateway(source),
        })?;
        tracing::info!(id = %created.id, "todo created");
        self.refresh_after_write().await;
        Ok(created)
    }

    async fn update(&self, edit: TodoEdit) -> Result<UpdateOutcome, TodoError> {
        self.ensure_editable(&edit.id, edit.done).await?;
        validate(&edit.name, &edit.description)?;
        let current = self.gateway.get(&edit.id).await?;
        if current.done {
            return Err(PolicyError::CompletedNotEditable(edit.id).into());
        }

        let mut patch = TodoPatch { name: Some(edit.name), description: Some(edit.description), ..TodoPatch::new(edit.id.clone()) };
        let mut stale_attachment = None;
        let mut replaced = None;
        if let Some(new_file) = &edit.new_file {
            let key = self.upload(new_file).await?;
            if let Some(old) = current.file.as_deref() {
                match self.store.delete(removal_key(old), Visibility::Public).await {
                    Ok(()) => replaced = Some(old.to_string()),
                    Err(e) => {
                        tracing::warn!(key = old, error = %e, "could not remove replaced attachment");
                        stale_attachment = Some(old.to_string());
                    }
                }
            }
            patch.file = Some(key);
        }

        let uploaded = patch.file.clone();
        let todo = self.gateway.update(patch).await.map_err(|source| match uploaded {
            Some(key) => {
                if let Some(old) = &replaced {
                    tracing::error!(id = %edit.id, %old, %key, error = %source, "todo update failed after its attachment was replaced");
                }
                TodoError::OrphanedAttachment { key, dangling: replaced, source }
            }
            None => TodoError::Gateway(source),
        })?;
        tracing::info!(id = %todo.id, "todo updated");

        {
            let mut state = self.state.write().await;
            if state.editing.as_ref() == Some(&todo.id) {
                state.editing = None;
            }
        }
        self.refresh_after_write().await;
        Ok(UpdateOutcome { todo, stale_attachment })
    }

    async fn toggle_done(&self, todo: &Todo) -> Result<ToggleOutcome, TodoError> {
        let target = !todo.done;
        let patch = TodoPatch { done: Some(target), ..TodoPatch::new(todo.id.clone()) };
        let updated = self.gateway.update(patch).await?;
        tracing::info!(id = %todo.id, done = target, "todo toggled");

        let notification = if target {
            self.completion_notice(todo).await.map(|n| self.dispatch(n))
        } else {
            None
        };
        self.refresh_after_write().await;
        Ok(ToggleOutcome { todo: updated, notification })
    }

    async fn delete(&self, id: &TodoId) -> Result<DeleteOutcome, TodoError> {
        let todo = self.gateway.get(id).await?;
        if todo.done {
            return Err(PolicyError::CompletedNotDeletable(id.clone()).into());
        }

        let attachment = match todo.file.as_deref() {
            None => AttachmentCleanup::NotNeeded,
            Some(key) => match self.store.delete(removal_key(key), Visibility::Public).await {
                Ok(()) => AttachmentCleanup::Removed(key.to_string()),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "attachment removal failed; deleting todo anyway");
                    AttachmentCleanup::Failed(key.to_string())
                }
            },
        };

        if let Err(source) = self.gateway.delete(id).await {
            return Err(match attachment {
                AttachmentCleanup::Removed(key) => {
                    tracing::error!(%id, %key, error = %source, "todo delete failed after its attachment was removed");
                    TodoError::DanglingReference { id: id.clone(), key, source }
                }
                _ => source.into(),
            });
        }
        tracing::info!(%id, "todo deleted");
        self.refresh_after_write().await;
        Ok(DeleteOutcome { attachment })
    }

    async fn get(&self, id: &TodoId) -> Result<Todo, TodoError> {
        if let Some(v) = self.state.read().await.todos.iter().find(|v| &v.todo.id == id) {
            return Ok(v.todo.clone());
        }
        Ok(self.gateway.get(id).await?)
    }

    async fn visible(&self) -> Vec<TodoView> {
        self.renew_urls().await;
        let state = self.state.read().await;
        filter_view(&state.todos, &state.search_query, state.filter_type)
    }

    async fn snapshot(&self) -> TodoListState {
        self.renew_urls().await;
        self.state.read().await.clone()
    }

    async fn set_search(&self, query: String) { self.state.write().await.search_query = query; }

    async fn set_filter(&self, filter: FilterType) { self.state.write().await.filter_type = filter; }

    async fn begin_edit(&self, id: &TodoId) -> Result<TodoEdit, TodoError> {
        let mut state = self.state.write().await;
        let view = state
            .todos
            .iter()
            .find(|v| &v.todo.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
        if view.todo.done {
            return Err(PolicyError::CompletedNotEditable(id.clone()).into());
        }
        let edit = TodoEdit::from(&view.todo);
        state.editing = Some(id.clone());
        Ok(edit)
    }

    async fn cancel_edit(&self) { self.state.write().await.editing = None; }

    async fn current_user(&self) -> Option<User> { self.identity.current_user().await }

    async fn sign_in(&self, credentials: Credentials) -> Result<User, TodoError> {
        let user = self.identity.sign_in(credentials).await?;
        tracing::info!(username = %user.username, "signed in");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), TodoError> {
        self.identity.sign_out().await?;
        self.state.write().await.editing = None;
        Ok(())
    }
}
