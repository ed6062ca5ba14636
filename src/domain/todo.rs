use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Opaque identifier assigned by the data gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TodoId(pub String);

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for TodoId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub file: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A todo as the presentation layer sees it, with its attachment resolved
/// to a short-lived display URL. `file_url` is rebuilt on every refresh.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TodoView {
    #[serde(flatten)]
    pub todo: Todo,
    pub file_url: Option<String>,
}

impl TodoView {
    pub fn without_url(todo: Todo) -> Self { Self { todo, file_url: None } }

    pub fn completion_label(&self) -> Option<String> {
        self.todo.done.then(|| completion_label(self.todo.updated_at))
    }
}

/// Image bytes picked by the user, not yet uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for NewAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAttachment")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TodoDraft {
    pub name: String,
    pub description: String,
    pub file: Option<NewAttachment>,
}

/// Edited copy of an existing todo. `file` is the key currently referenced
/// by the record; `new_file` replaces it when present.
#[derive(Debug, Clone)]
pub struct TodoEdit {
    pub id: TodoId,
    pub name: String,
    pub description: String,
    pub done: bool,
    pub file: Option<String>,
    pub new_file: Option<NewAttachment>,
}

impl From<&Todo> for TodoEdit {
    fn from(todo: &Todo) -> Self {
        Self {
            id: todo.id.clone(),
            name: todo.name.clone(),
            description: todo.description.clone(),
            done: todo.done,
            file: todo.file.clone(),
            new_file: None,
        }
    }
}

/// Fields for a record create, as submitted to the data gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTodo {
    pub name: String,
    pub description: String,
    pub file: Option<String>,
    pub done: bool,
}

/// Partial update: only fields that are `Some` are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoPatch {
    pub id: TodoId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl TodoPatch {
    pub fn new(id: TodoId) -> Self { Self { id, ..Default::default() } }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    All,
    Completed,
    Remaining,
}

impl FilterType {
    pub fn next(self) -> Self {
        match self {
            FilterType::All => FilterType::Completed,
            FilterType::Completed => FilterType::Remaining,
            FilterType::Remaining => FilterType::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::All => "all",
            FilterType::Completed => "completed",
            FilterType::Remaining => "remaining",
        }
    }

    pub fn admits(self, todo: &Todo) -> bool {
        match self {
            FilterType::All => true,
            FilterType::Completed => todo.done,
            FilterType::Remaining => !todo.done,
        }
    }
}

impl FromStr for FilterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(FilterType::All),
            "completed" => Ok(FilterType::Completed),
            "remaining" => Ok(FilterType::Remaining),
            other => Err(format!("unknown filter `{other}`")),
        }
    }
}

/// Both fields must carry non-whitespace text.
pub fn validate(name: &str, description: &str) -> Result<(), ValidationError> {
    match (name.trim().is_empty(), description.trim().is_empty()) {
        (true, true) => Err(ValidationError::MissingTitleAndDescription),
        (true, false) => Err(ValidationError::MissingTitle),
        (false, true) => Err(ValidationError::MissingDescription),
        (false, false) => Ok(()),
    }
}

/// Storage key for a fresh upload: `todos/{unix_millis}-{file_name}`.
pub fn attachment_key(now: DateTime<Utc>, file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    format!("todos/{}-{}", now.timestamp_millis(), base)
}

/// Keys recorded by older clients may carry the visibility prefix.
pub fn removal_key(key: &str) -> &str {
    let key = key.strip_prefix('/').unwrap_or(key);
    key.strip_prefix("public/").unwrap_or(key)
}

const IST_OFFSET_MINUTES: i64 = 5 * 60 + 30;

/// Completion time in IST as shown beside finished todos, e.g. `4:05 pm, 02 Mar 2025`.
pub fn completion_label(at: DateTime<Utc>) -> String {
    let local = at.naive_utc() + Duration::minutes(IST_OFFSET_MINUTES);
    local.format("%-I:%M %P, %d %b %Y").to_string()
}
