//! Refresh Token Entity
//!
//! Server-side record of an issued refresh token. Only the SHA-256 of the
//! token is stored.
//!
//! ## State machine
//! `Active` moves to `Revoked` on rotation or sign-out, or to `Expired` once
//! its TTL elapses. Neither is ever usable again; cleanup deletes both.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{RefreshTokenId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: RefreshTokenId,
    pub user_id: UserId,
    /// Lowercase hex SHA-256 of the token
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    Active,
    Revoked,
    Expired,
}

impl RefreshToken {
    pub fn state(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if self.revoked {
            RefreshTokenState::Revoked
        } else if self.expires_at <= now {
            RefreshTokenState::Expired
        } else {
            RefreshTokenState::Active
        }
    }

    #[inline]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == RefreshTokenState::Active
    }
}
