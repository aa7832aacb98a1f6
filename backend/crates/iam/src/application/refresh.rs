//! Refresh Use Case
//!
//! Trades a refresh token for a new session. The presented token is
//! consumed whether or not the caller ever uses the new pair.

use crate::application::context::IamContext;
use crate::application::session::{Session, SessionManager};
use crate::domain::repository::IamStore;
use crate::error::{IamError, IamResult};

/// Refresh use case
pub struct RefreshUseCase<S: IamStore> {
    ctx: IamContext<S>,
    sessions: SessionManager<S>,
}

impl<S: IamStore> RefreshUseCase<S> {
    pub fn new(ctx: IamContext<S>, sessions: SessionManager<S>) -> Self {
        Self { ctx, sessions }
    }

    pub async fn execute(&self, refresh_token: &str) -> IamResult<Session> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(IamError::InvalidInput("refresh token is required".into()));
        }

        let mut tx = self.ctx.store.begin().await?;
        let session = self.sessions.rotate(&mut tx, refresh_token).await?;
        self.ctx.store.commit(tx).await?;

        Ok(session)
    }
}
