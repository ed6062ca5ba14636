use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{
    error::IdentityError,
    gateways::IdentityProvider,
    user::{Credentials, User},
};

/// Identity provider for a single configured account.
pub struct StaticIdentityProvider {
    account: User,
    password: String,
    session: Mutex<Option<User>>,
}

impl StaticIdentityProvider {
    pub fn new(account: User, password: impl Into<String>) -> Self {
        Self { account, password: password.into(), session: Mutex::new(None) }
    }

    /// Starts with the account already signed in.
    pub fn signed_in(self) -> Self {
        self.set_session(Some(self.account.clone()));
        self
    }

    fn set_session(&self, user: Option<User>) {
        match self.session.lock() {
            Ok(mut guard) => *guard = user,
            Err(poisoned) => *poisoned.into_inner() = user,
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn current_user(&self) -> Option<User> {
        match self.session.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn sign_in(&self, credentials: Credentials) -> Result<User, IdentityError> {
        let matches_account = credentials.username == self.account.username
            || self.account.email.as_deref() == Some(credentials.username.as_str());
        if !matches_account || credentials.password != self.password {
            tracing::warn!(username = %credentials.username, "sign-in rejected");
            return Err(IdentityError::InvalidCredentials);
        }
        self.set_session(Some(self.account.clone()));
        Ok(self.account.clone())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if self.current_user().await.is_none() {
            return Err(IdentityError::NotSignedIn);
        }
        self.set_session(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> StaticIdentityProvider {
        let account = User { username: "asha".into(), name: Some("Asha".into()), email: Some("asha@example.com".into()) };
        StaticIdentityProvider::new(account, "hunter2")
    }

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials { username: username.into(), password: password.into() }
    }

    #[tokio::test]
    async fn sign_in_by_username_or_email_then_out() {
        let idp = provider();
        assert!(idp.current_user().await.is_none());
        idp.sign_in(creds("asha@example.com", "hunter2")).await.unwrap();
        assert_eq!(idp.current_user().await.unwrap().username, "asha");
        idp.sign_out().await.unwrap();
        assert!(idp.current_user().await.is_none());
        assert_eq!(idp.sign_out().await, Err(IdentityError::NotSignedIn));
        idp.sign_in(creds("asha", "hunter2")).await.unwrap();
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let idp = provider();
        assert_eq!(idp.sign_in(creds("asha", "nope")).await, Err(IdentityError::InvalidCredentials));
        assert!(idp.current_user().await.is_none());
    }

    #[tokio::test]
    async fn signed_in_starts_with_session() {
        assert!(provider().signed_in().current_user().await.is_some());
    }
}
