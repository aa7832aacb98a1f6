//! Mailer Port
//!
//! Outbound email. The engine hands over a finished message and only cares
//! whether delivery was accepted.

use thiserror::Error;

use crate::domain::value_object::Email;

pub const CONTENT_TYPE_HTML: &str = "text/html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailContent {
    pub content_type: String,
    pub title: String,
    pub body: String,
}

impl MailContent {
    pub fn html(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            content_type: CONTENT_TYPE_HTML.to_string(),
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailerError {
    #[error("delivery rejected: {0}")]
    Delivery(String),
}

#[trait_variant::make(Mailer: Send)]
pub trait LocalMailer {
    async fn send_email(&self, to: &Email, content: &MailContent) -> Result<(), MailerError>;
}
