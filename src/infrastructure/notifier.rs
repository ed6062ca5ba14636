use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::domain::{
    error::NotificationError,
    gateways::{Notification, NotificationDispatcher},
};

/// Invokes the email-sending function over HTTP with its
/// `{ email, subject, body }` event payload.
#[derive(Clone)]
pub struct FunctionNotifier {
    client: Client,
    url: String,
}

impl FunctionNotifier {
    pub fn new(url: impl Into<String>) -> Self { Self { client: Client::new(), url: url.into() } }
}

#[async_trait]
impl NotificationDispatcher for FunctionNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        let payload = json!({
            "email": notification.recipient,
            "subject": notification.subject,
            "body": notification.body,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotificationError::Rejected { status: status.as_u16(), body })
        }
    }
}

/// Logs notifications instead of delivering them.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        tracing::info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            body = %notification.body,
            "notification (not delivered: no function URL configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification() -> Notification {
        Notification { recipient: "asha@example.com".into(), subject: "Todo completion update".into(), body: "Hello Asha".into() }
    }

    #[tokio::test]
    async fn posts_function_event_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sendEmail"))
            .and(body_json(json!({ "email": "asha@example.com", "subject": "Todo completion update", "body": "Hello Asha" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("Email sent!"))
            .expect(1)
            .mount(&server)
            .await;

        FunctionNotifier::new(format!("{}/sendEmail", server.uri())).send(notification()).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("MessageRejected"))
            .mount(&server)
            .await;

        let err = FunctionNotifier::new(server.uri()).send(notification()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Rejected { status: 500, ref body } if body == "MessageRejected"));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.send(notification()).await.is_ok());
    }
}
