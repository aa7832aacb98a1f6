//! Domain Layer
//!
//! Entities, value objects, the authorization model and the ports the
//! engine consumes.

pub mod entity;
pub mod mailer;
pub mod page;
pub mod principal;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{EmailConfirmation, RefreshToken, Tenant, User};
pub use mailer::{MailContent, Mailer, MailerError};
pub use page::{Page, PageRequest};
pub use principal::Principal;
pub use repository::IamStore;
