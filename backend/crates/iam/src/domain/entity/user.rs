//! User Entity
//!
//! An identity inside exactly one tenant.

use chrono::{DateTime, Utc};
use platform::password::HashedPassword;

use crate::domain::value_object::{Email, TenantId, UserId};
use crate::error::{IamError, IamResult};

/// Maximum length of a first or last name
pub const NAME_MAX_LENGTH: usize = 100;

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub email: Email,
    pub password_hash: HashedPassword,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A freshly signed-up user: active, email not yet verified
    pub fn new(
        user_id: UserId,
        tenant_id: TenantId,
        email: Email,
        password_hash: HashedPassword,
        first_name: String,
        last_name: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            tenant_id,
            email,
            password_hash,
            first_name,
            last_name,
            active: true,
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Users that may obtain a session
    pub fn can_sign_in(&self) -> bool {
        self.active && self.email_verified
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Typed partial update of a user's personal details
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDetailPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserDetailPatch {
    /// Trim and validate; a patch touching nothing is rejected
    pub fn normalized(self) -> IamResult<Self> {
        if self.first_name.is_none() && self.last_name.is_none() {
            return Err(IamError::InvalidInput("nothing to update".into()));
        }
        Ok(Self {
            first_name: self
                .first_name
                .map(|n| normalize_name(&n, "first name"))
                .transpose()?,
            last_name: self
                .last_name
                .map(|n| normalize_name(&n, "last name"))
                .transpose()?,
        })
    }

    pub fn apply(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(first) = &self.first_name {
            user.first_name = first.clone();
        }
        if let Some(last) = &self.last_name {
            user.last_name = last.clone();
        }
        user.updated_at = now;
    }
}

/// Replacement password hash
#[derive(Debug, Clone)]
pub struct PasswordPatch {
    pub hash: HashedPassword,
}

/// Trimmed, non-empty, bounded name
pub fn normalize_name(raw: &str, field: &str) -> IamResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(IamError::InvalidInput(format!("{field} is required")));
    }
    if name.chars().count() > NAME_MAX_LENGTH {
        return Err(IamError::InvalidInput(format!(
            "{field} must be at most {NAME_MAX_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}
