//! Email Value Object
//!
//! Represents a syntactically valid, normalized email address.
//! Ownership is proven separately through email confirmation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IamError;

/// Maximum email length (per RFC 5321)
const EMAIL_MAX_LENGTH: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// Trim, lowercase and validate
    pub fn new(email: impl Into<String>) -> Result<Self, IamError> {
        let email = email.into().trim().to_lowercase();

        if email.is_empty() {
            return Err(IamError::InvalidInput("email is required".into()));
        }
        if email.len() > EMAIL_MAX_LENGTH {
            return Err(IamError::InvalidInput(format!(
                "email must be at most {} characters",
                EMAIL_MAX_LENGTH
            )));
        }
        if !Self::is_valid_format(&email) {
            return Err(IamError::InvalidInput("invalid email format".into()));
        }

        Ok(Self(email))
    }

    fn is_valid_format(email: &str) -> bool {
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };
        if domain.contains('@') {
            return false;
        }
        if local.is_empty() || local.len() > 64 || local.chars().any(char::is_whitespace) {
            return false;
        }
        if domain.is_empty() || !domain.contains('.') {
            return false;
        }
        if !domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return false;
        }
        !(domain.starts_with(['.', '-']) || domain.ends_with(['.', '-']) || domain.contains(".."))
    }

    /// Rebuild from storage (already validated on the way in)
    pub fn from_db(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Email {
    type Err = IamError;

    fn from_str(s: &str) -> Result<Self, IamError> {
        Email::new(s)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
