//! Infrastructure Layer
//!
//! Adapters for the persistence and mailer ports.

pub mod mailer;
pub mod memory;
pub mod postgres;

pub use mailer::InMemoryMailer;
pub use memory::MemoryIamStore;
pub use postgres::PgIamStore;
