//! Email Confirmation Entity
//!
//! Single-use activation credential. One row per user; a new sign-up
//! attempt replaces it.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{Email, EmailConfirmationId, SignupSource, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfirmation {
    pub id: EmailConfirmationId,
    pub user_id: UserId,
    /// Address the code was sent to
    pub email: Email,
    /// `SHA-256(user_id ":" code)` as lowercase hex
    pub code_hash: String,
    pub source: SignupSource,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Redeemable,
    Expired,
    AlreadyUsed,
}

impl EmailConfirmation {
    /// Expiry is checked before use
    pub fn status(&self, now: DateTime<Utc>) -> ConfirmationStatus {
        if self.expires_at <= now {
            ConfirmationStatus::Expired
        } else if self.used_at.is_some() {
            ConfirmationStatus::AlreadyUsed
        } else {
            ConfirmationStatus::Redeemable
        }
    }

    /// Used or expired rows are eligible for garbage collection
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status(now) != ConfirmationStatus::Redeemable
    }
}
