//! In-Memory Mailer
//!
//! Records every accepted message instead of delivering it. Delivery can be
//! switched to fail to exercise the abort path of sign-up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::domain::mailer::{MailContent, Mailer, MailerError};
use crate::domain::value_object::Email;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: Email,
    pub content: MailContent,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryMailer {
    outbox: Arc<Mutex<Vec<SentMail>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentMail> {
        self.outbox.lock().await.clone()
    }

    /// Most recent message sent to `to`
    pub async fn last_to(&self, to: &str) -> Option<SentMail> {
        self.outbox
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.to.as_str() == to)
            .cloned()
    }
}

impl Mailer for InMemoryMailer {
    async fn send_email(&self, to: &Email, content: &MailContent) -> Result<(), MailerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailerError::Delivery("mailer is switched off".into()));
        }
        tracing::debug!(to = %to, title = %content.title, "Recording outbound email");
        self.outbox.lock().await.push(SentMail {
            to: to.clone(),
            content: content.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_fails_on_demand() {
        let mailer = InMemoryMailer::new();
        let to = Email::new("ada@example.com").unwrap();
        let content = MailContent::html("Hello", "<p>hi</p>");

        mailer.send_email(&to, &content).await.unwrap();
        assert_eq!(mailer.sent().await.len(), 1);
        assert_eq!(
            mailer.last_to("ada@example.com").await.unwrap().content.content_type,
            "text/html"
        );

        mailer.set_failing(true);
        assert!(mailer.send_email(&to, &content).await.is_err());
        assert_eq!(mailer.sent().await.len(), 1);
    }
}
