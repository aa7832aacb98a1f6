//! Application Layer
//!
//! Use cases and application services.

pub mod auth_service;
pub mod config;
pub mod confirm_email;
pub mod confirmation;
pub mod context;
pub mod refresh;
pub mod session;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;
pub mod sweep;
pub mod tenant_management;
pub mod token;
pub mod user_management;

// Re-exports
pub use auth_service::AuthService;
pub use config::IamConfig;
pub use confirm_email::{ConfirmEmailInput, ConfirmEmailUseCase};
pub use confirmation::{ConfirmationWorkflow, IssuedConfirmation};
pub use context::IamContext;
pub use refresh::RefreshUseCase;
pub use session::{Session, SessionManager};
pub use sign_in::{SignInInput, SignInUseCase};
pub use sign_out::SignOutUseCase;
pub use sign_up::{SignUpInput, SignUpOutput, SignUpUseCase};
pub use sweep::{SweepReport, SweepUseCase};
pub use tenant_management::{NewTenant, TenantManagement};
pub use token::{Claims, TokenCodec, TokenType};
pub use user_management::{UserManagement, UserRoles, UserSummary};
