//! Error Kind
//!
//! The closed set of failure classes every operation reduces to.

use serde::Serialize;

/// Classification of a failure as seen by a caller
///
/// Each kind maps to exactly one HTTP status code so that a transport layer
/// can render it without inspecting the cause.
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// assert_eq!(ErrorKind::NoPermissions.status_code(), 403);
/// assert_eq!(ErrorKind::Duplicate.as_str(), "Duplicate");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Missing or malformed input
    InvalidInput,
    /// Bad credentials or an invalid, expired, revoked or wrong-type token
    Unauthorized,
    /// Authenticated, but the caller is not allowed to do this
    NoPermissions,
    /// Unknown user, tenant, role or confirmation code
    NotFound,
    /// Verified email or tenant id collision
    Duplicate,
    /// Hashing, signing, persistence or delivery failure
    Internal,
}

impl ErrorKind {
    /// HTTP status code for this kind
    ///
    /// ## Returns
    /// A status in `400..=500`. Only [`ErrorKind::Internal`] is a 5xx.
    #[inline]
    pub const fn status_code(&self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::NoPermissions => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Duplicate => 409,
            ErrorKind::Internal => 500,
        }
    }

    /// Human-readable name, also used by `Display`
    ///
    /// ## Examples
    /// ```rust
    /// use kernel::error::kind::ErrorKind;
    /// assert_eq!(ErrorKind::NoPermissions.to_string(), "No Permissions");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "Invalid Input",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::NoPermissions => "No Permissions",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::Duplicate => "Duplicate",
            ErrorKind::Internal => "Internal",
        }
    }

    /// Server-side failures must be logged with context
    #[inline]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// 4xx kinds: the caller can fix the request
    #[inline]
    pub const fn is_client_error(&self) -> bool {
        let code = self.status_code();
        code >= 400 && code < 500
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::InvalidInput.status_code(), 400);
        assert_eq!(ErrorKind::Unauthorized.status_code(), 401);
        assert_eq!(ErrorKind::NoPermissions.status_code(), 403);
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::Duplicate.status_code(), 409);
        assert_eq!(ErrorKind::Internal.status_code(), 500);
    }

    #[test]
    fn test_classification() {
        assert!(ErrorKind::Internal.is_server_error());
        assert!(!ErrorKind::Internal.is_client_error());
        assert!(ErrorKind::NoPermissions.is_client_error());
        assert!(!ErrorKind::NotFound.is_server_error());
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&ErrorKind::NoPermissions).unwrap();
        assert_eq!(json, "\"NO_PERMISSIONS\"");
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorKind::InvalidInput.to_string(), "Invalid Input");
    }
}
