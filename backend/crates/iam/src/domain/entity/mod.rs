//! Domain Entities

pub mod email_confirmation;
pub mod refresh_token;
pub mod tenant;
pub mod user;

pub use email_confirmation::{ConfirmationStatus, EmailConfirmation};
pub use refresh_token::{RefreshToken, RefreshTokenState};
pub use tenant::{Tenant, TenantPatch};
pub use user::{PasswordPatch, User, UserDetailPatch};
