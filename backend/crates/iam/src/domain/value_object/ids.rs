//! Identifier types for IAM entities

use kernel::id::Id;

pub mod markers {
    pub struct User;
    pub struct Tenant;
    pub struct RefreshToken;
    pub struct EmailConfirmation;
}

pub type UserId = Id<markers::User>;
pub type TenantId = Id<markers::Tenant>;
pub type RefreshTokenId = Id<markers::RefreshToken>;
pub type EmailConfirmationId = Id<markers::EmailConfirmation>;
