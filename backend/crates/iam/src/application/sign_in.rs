//! Sign In Use Case
//!
//! Authenticates a user inside a tenant and creates a session.

use platform::password::ClearTextPassword;

use crate::application::context::IamContext;
use crate::application::session::{Session, SessionManager};
use crate::domain::repository::IamStore;
use crate::domain::value_object::{Email, TenantId};
use crate::error::{IamError, IamResult};

/// Sign in input
pub struct SignInInput {
    pub email: String,
    pub password: String,
    pub tenant_id: String,
}

/// Sign in use case
pub struct SignInUseCase<S: IamStore> {
    ctx: IamContext<S>,
    sessions: SessionManager<S>,
}

impl<S: IamStore> SignInUseCase<S> {
    pub fn new(ctx: IamContext<S>, sessions: SessionManager<S>) -> Self {
        Self { ctx, sessions }
    }

    pub async fn execute(&self, input: SignInInput) -> IamResult<Session> {
        if input.email.trim().is_empty() {
            return Err(IamError::InvalidInput("email is required".into()));
        }
        if input.password.is_empty() {
            return Err(IamError::InvalidInput("password is required".into()));
        }
        let tenant_id = input.tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(IamError::InvalidInput("tenant id is required".into()));
        }
        let tenant_id = TenantId::new(tenant_id);

        let password = ClearTextPassword::unchecked(input.password);

        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        // Tenant gating comes first, even for a malformed address
        self.ctx.require_tenant(&mut tx, &tenant_id).await?;

        // A malformed address cannot belong to anyone
        let email = Email::new(input.email).map_err(|_| IamError::InvalidCredentials)?;
        let user = store
            .find_user_by_email(&mut tx, &tenant_id, &email)
            .await?
            .ok_or(IamError::InvalidCredentials)?;

        if !user.password_hash.verify(&password, self.ctx.config.pepper()) {
            tracing::debug!(user_id = %user.user_id, "Password mismatch");
            return Err(IamError::InvalidCredentials);
        }

        if !user.email_verified {
            return Err(IamError::EmailNotVerified);
        }
        if !user.active {
            return Err(IamError::AccountDisabled);
        }

        let session = self.sessions.issue_session(&mut tx, &user).await?;
        store.commit(tx).await?;

        tracing::info!(
            user_id = %user.user_id,
            tenant_id = %user.tenant_id,
            "User signed in"
        );

        Ok(session)
    }
}
