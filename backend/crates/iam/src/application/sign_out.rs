//! Sign Out Use Case
//!
//! Revokes every refresh token of the user. Access tokens already handed
//! out stay valid until they expire.

use crate::application::context::IamContext;
use crate::application::session::SessionManager;
use crate::domain::repository::IamStore;
use crate::domain::value_object::UserId;
use crate::error::{IamError, IamResult};

/// Sign out use case
pub struct SignOutUseCase<S: IamStore> {
    ctx: IamContext<S>,
    sessions: SessionManager<S>,
}

impl<S: IamStore> SignOutUseCase<S> {
    pub fn new(ctx: IamContext<S>, sessions: SessionManager<S>) -> Self {
        Self { ctx, sessions }
    }

    /// Returns the number of refresh tokens revoked
    pub async fn execute(&self, user_id: &UserId) -> IamResult<u64> {
        if user_id.is_empty() {
            return Err(IamError::InvalidInput("user id is required".into()));
        }

        let mut tx = self.ctx.store.begin().await?;
        let revoked = self.sessions.revoke_all(&mut tx, user_id).await?;
        self.ctx.store.commit(tx).await?;

        tracing::info!(user_id = %user_id, revoked, "User signed out");

        Ok(revoked)
    }
}
