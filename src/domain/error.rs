use thiserror::Error;

use super::todo::TodoId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title is required.")]
    MissingTitle,
    #[error("Description is required.")]
    MissingDescription,
    #[error("Title and description are required.")]
    MissingTitleAndDescription,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("todo {0} not found")]
    NotFound(TodoId),
    #[error("gateway request failed: {0}")]
    Transport(String),
    #[error("gateway rejected the request: {0}")]
    Remote(String),
    #[error("unexpected gateway response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("could not sign object URL: {0}")]
    Signing(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification request failed: {0}")]
    Transport(String),
    #[error("notification function returned status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Incorrect username or password.")]
    InvalidCredentials,
    #[error("not signed in")]
    NotSignedIn,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("todo {0} is completed and can no longer be edited")]
    CompletedNotEditable(TodoId),
    #[error("todo {0} is completed and can no longer be deleted")]
    CompletedNotDeletable(TodoId),
}

/// Failure of one orchestration workflow.
#[derive(Debug, Error)]
pub enum TodoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("attachment upload failed: {0}")]
    Upload(#[source] StorageError),
    /// The record write failed after its attachment was stored; `key` is
    /// left in the object store with nothing referencing it. `dangling` is
    /// the replaced attachment, already removed but still referenced.
    #[error("{source} (uploaded attachment `{key}` is now unreferenced{})", dangling_note(.dangling))]
    OrphanedAttachment {
        key: String,
        dangling: Option<String>,
        #[source]
        source: GatewayError,
    },
    /// The record delete failed after its attachment was removed; the
    /// record still references `key`.
    #[error("{source} (todo {id} still references removed attachment `{key}`)")]
    DanglingReference {
        id: TodoId,
        key: String,
        #[source]
        source: GatewayError,
    },
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl TodoError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TodoError::Gateway(GatewayError::NotFound(_))
                | TodoError::OrphanedAttachment { source: GatewayError::NotFound(_), .. }
                | TodoError::DanglingReference { source: GatewayError::NotFound(_), .. }
        )
    }
}

fn dangling_note(dangling: &Option<String>) -> String {
    match dangling {
        Some(key) => format!("; removed attachment `{key}` is still referenced"),
        None => String::new(),
    }
}
