//! IAM (Identity & Access Management) Engine
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, the principal model and ports
//! - `application/` - Use cases and application services
//! - `infra/` - Postgres and in-memory adapters
//!
//! ## Features
//! - Tenant-scoped sign-up with email confirmation (link or 6-digit code)
//! - Sign-in issuing a short-lived access token and a rotating refresh token
//! - Refresh rotation with replay defense and a bound on live sessions
//! - Role-based authorization of user and tenant management
//!
//! ## Security Model
//! - Passwords hashed with Argon2id
//! - Refresh tokens and confirmation codes stored only as SHA-256 hashes
//! - Access and refresh tokens are HS256 JWTs with a type marker, so one
//!   is never accepted in place of the other

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::{AuthService, IamConfig, IamContext, TenantManagement, UserManagement};
pub use domain::{IamStore, Mailer, Principal};
pub use error::{IamError, IamResult};
pub use infra::{InMemoryMailer, MemoryIamStore, PgIamStore};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
}
