//! Value Objects

pub mod email;
pub mod ids;
pub mod role;
pub mod signup_source;

pub use email::Email;
pub use ids::{EmailConfirmationId, RefreshTokenId, TenantId, UserId};
pub use role::Role;
pub use signup_source::{ConfirmationChannel, SignupSource};
