//! IAM Error Types
//!
//! Engine-specific failure causes. Every variant reduces to one
//! `kernel::error::kind::ErrorKind`, and internal causes are masked before
//! they reach a caller.

use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::password::PasswordHashError;
use thiserror::Error;

use crate::domain::mailer::MailerError;

pub type IamResult<T> = Result<T, IamError>;

#[derive(Debug, Error)]
pub enum IamError {
    /// Missing or malformed input
    #[error("{0}")]
    InvalidInput(String),

    /// Unknown email or wrong password, deliberately indistinguishable
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email address not verified")]
    EmailNotVerified,

    #[error("account is disabled")]
    AccountDisabled,

    /// Bad signature, expired, wrong type, revoked or unknown
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    NoPermissions(String),

    #[error("tenant not found")]
    TenantNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("role not found: {0}")]
    RoleNotFound(String),

    #[error("role not assigned: {0}")]
    RoleNotAssigned(String),

    #[error("invalid confirmation code")]
    ConfirmationNotFound,

    #[error("confirmation code has expired")]
    ConfirmationExpired,

    #[error("confirmation code has already been used")]
    ConfirmationAlreadyUsed,

    #[error("user with this email already exists")]
    DuplicateAccount,

    #[error("tenant already exists")]
    DuplicateTenant,

    #[error("role already assigned: {0}")]
    RoleAlreadyAssigned(String),

    #[error("tenant still has users")]
    TenantHasUsers,

    #[error("mail delivery failed: {0}")]
    Mailer(#[from] MailerError),

    #[error("password hashing failed: {0}")]
    Password(#[from] PasswordHashError),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IamError::InvalidInput(_)
            | IamError::ConfirmationExpired
            | IamError::ConfirmationAlreadyUsed
            | IamError::TenantHasUsers => ErrorKind::InvalidInput,
            IamError::InvalidCredentials
            | IamError::EmailNotVerified
            | IamError::AccountDisabled
            | IamError::InvalidToken => ErrorKind::Unauthorized,
            IamError::NoPermissions(_) => ErrorKind::NoPermissions,
            IamError::TenantNotFound
            | IamError::UserNotFound
            | IamError::RoleNotFound(_)
            | IamError::RoleNotAssigned(_)
            | IamError::ConfirmationNotFound => ErrorKind::NotFound,
            IamError::DuplicateAccount
            | IamError::DuplicateTenant
            | IamError::RoleAlreadyAssigned(_) => ErrorKind::Duplicate,
            IamError::Mailer(_)
            | IamError::Password(_)
            | IamError::Signing(_)
            | IamError::Database(_)
            | IamError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Caller-facing form; internal detail never leaves the engine
    pub fn to_app_error(&self) -> AppError {
        match self.kind() {
            ErrorKind::Internal => AppError::internal("internal error"),
            kind => {
                let err = AppError::new(kind, self.to_string());
                match self {
                    IamError::EmailNotVerified => {
                        err.with_action("Confirm your email address before signing in")
                    }
                    IamError::InvalidToken => err.with_action("Sign in again"),
                    IamError::ConfirmationExpired => err.with_action("Sign up again to get a new code"),
                    _ => err,
                }
            }
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            IamError::Database(e) => {
                tracing::error!(error = %e, "IAM database error");
            }
            IamError::Mailer(e) => {
                tracing::error!(error = %e, "IAM mail delivery error");
            }
            IamError::Password(e) => {
                tracing::error!(error = %e, "IAM password hashing error");
            }
            IamError::Signing(msg) | IamError::Internal(msg) => {
                tracing::error!(message = %msg, "IAM internal error");
            }
            IamError::InvalidCredentials => {
                tracing::warn!("Invalid sign-in attempt");
            }
            IamError::InvalidToken => {
                tracing::warn!("Invalid token presented");
            }
            IamError::NoPermissions(reason) => {
                tracing::warn!(reason = %reason, "Permission denied");
            }
            _ => {
                tracing::debug!(error = %self, "IAM error");
            }
        }
    }
}

impl From<IamError> for AppError {
    fn from(err: IamError) -> Self {
        err.to_app_error()
    }
}
