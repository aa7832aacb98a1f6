//! Application Error
//!
//! Defines [`AppError`], the error a caller at the boundary sees, and the
//! [`AppResult<T>`] alias.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use super::kind::ErrorKind;

/// Boundary error
///
/// Carries only caller-safe text. Internal detail travels in `source`,
/// which is never rendered by `Display`.
///
/// ## Fields
/// * `kind` - failure class (maps to an HTTP status code)
/// * `message` - message shown to the caller
/// * `action` - what the caller should do next (optional)
/// * `source` - underlying cause, for logs only (optional)
///
/// ## Examples
/// ```rust
/// use kernel::error::{app_error::AppError, kind::ErrorKind};
///
/// let err = AppError::not_found("tenant not found")
///     .with_action("Check the tenant id");
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// ```
pub struct AppError {
    /// Failure class
    kind: ErrorKind,
    /// Caller-safe message
    message: Cow<'static, str>,
    /// Suggested next step
    action: Option<Cow<'static, str>>,
    /// Underlying cause (never displayed)
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

/// Shorthand for `Result<T, AppError>`
///
/// ## Examples
/// ```rust
/// use kernel::error::app_error::{AppError, AppResult};
///
/// fn find_tenant(id: &str) -> AppResult<String> {
///     if id.is_empty() {
///         return Err(AppError::invalid_input("tenant id is required"));
///     }
///     Ok(id.to_string())
/// }
///
/// assert!(find_tenant("").is_err());
/// ```
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Build an error of the given kind
    ///
    /// ## Arguments
    /// * `kind` - failure class
    /// * `message` - caller-safe message
    ///
    /// ## Examples
    /// ```rust
    /// use kernel::error::{app_error::AppError, kind::ErrorKind};
    /// let err = AppError::new(ErrorKind::InvalidInput, "password is too short");
    /// assert_eq!(err.status_code(), 400);
    /// ```
    #[inline]
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            action: None,
            source: None,
        }
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    /// 400 Invalid Input
    #[inline]
    pub fn invalid_input(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// 401 Unauthorized
    #[inline]
    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// 403 No Permissions
    #[inline]
    pub fn no_permissions(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NoPermissions, message)
    }

    /// 404 Not Found
    #[inline]
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// 409 Duplicate
    #[inline]
    pub fn duplicate(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Duplicate, message)
    }

    /// 500 Internal
    ///
    /// The message should stay generic; put the cause in [`with_source`](Self::with_source).
    #[inline]
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Attach a hint telling the caller what to do next
    ///
    /// ## Examples
    /// ```rust
    /// use kernel::error::app_error::AppError;
    /// let err = AppError::unauthorized("invalid or expired token").with_action("Sign in again");
    /// assert_eq!(err.action(), Some("Sign in again"));
    /// ```
    #[inline]
    pub fn with_action(mut self, action: impl Into<Cow<'static, str>>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Attach the underlying cause (for logs, never for the caller)
    #[inline]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status code of the kind
    #[inline]
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Whether this should be logged as a server-side failure
    #[inline]
    pub fn is_server_error(&self) -> bool {
        self.kind.is_server_error()
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("AppError");
        builder.field("kind", &self.kind);
        builder.field("message", &self.message);
        if let Some(action) = &self.action {
            builder.field("action", action);
        }
        if let Some(source) = &self.source {
            builder.field("source", source);
        }
        builder.finish()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(action) = &self.action {
            write!(f, " (Action: {})", action)?;
        }
        Ok(())
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_error() {
        let err = AppError::new(ErrorKind::NotFound, "user not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.message(), "user not found");
        assert!(err.action().is_none());
    }

    #[test]
    fn test_convenience_constructors() {
        assert_eq!(AppError::invalid_input("x").kind(), ErrorKind::InvalidInput);
        assert_eq!(AppError::unauthorized("x").kind(), ErrorKind::Unauthorized);
        assert_eq!(AppError::no_permissions("x").kind(), ErrorKind::NoPermissions);
        assert_eq!(AppError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(AppError::duplicate("x").kind(), ErrorKind::Duplicate);
        assert_eq!(AppError::internal("x").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_source_is_not_displayed() {
        let io_err = std::io::Error::other("connection reset by peer");
        let err = AppError::internal("internal error").with_source(io_err);
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "[Internal] internal error");
    }

    #[test]
    fn test_display_with_action() {
        let err = AppError::unauthorized("invalid or expired token").with_action("Sign in again");
        assert_eq!(
            err.to_string(),
            "[Unauthorized] invalid or expired token (Action: Sign in again)"
        );
    }

    #[test]
    fn test_is_server_error() {
        assert!(!AppError::not_found("x").is_server_error());
        assert!(AppError::internal("x").is_server_error());
    }
}
