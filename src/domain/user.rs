use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl User {
    /// Profile name, then the local part of the email, then `"User"`.
    pub fn display_name(&self) -> String {
        let non_blank = |s: &&str| !s.trim().is_empty();
        self.name
            .as_deref()
            .filter(non_blank)
            .or_else(|| self.email.as_deref().and_then(|e| e.split('@').next()).filter(non_blank))
            .unwrap_or("User")
            .to_string()
    }
}

pub fn display_name(user: Option<&User>) -> String {
    user.map(User::display_name).unwrap_or_else(|| "User".to_string())
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("username", &self.username).finish_non_exhaustive()
    }
}
