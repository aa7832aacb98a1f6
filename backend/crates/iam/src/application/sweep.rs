//! Sweep Use Case
//!
//! Store-wide garbage collection of dead refresh tokens and confirmation
//! rows. Per-user cleanup already happens on every session issue; this
//! catches users who never sign in again.

use crate::application::context::IamContext;
use crate::domain::repository::IamStore;
use crate::error::{IamError, IamResult};

/// Rows removed by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub refresh_tokens: u64,
    pub confirmations: u64,
}

/// Sweep use case
pub struct SweepUseCase<S: IamStore> {
    ctx: IamContext<S>,
}

impl<S: IamStore> SweepUseCase<S> {
    pub fn new(ctx: IamContext<S>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> IamResult<SweepReport> {
        self.run().await.inspect_err(IamError::log)
    }

    async fn run(&self) -> IamResult<SweepReport> {
        let now = self.ctx.now();
        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        let refresh_tokens = store.purge_expired_refresh_tokens(&mut tx, now).await?;
        let confirmations = store.purge_stale_confirmations(&mut tx, now).await?;
        store.commit(tx).await?;

        tracing::info!(refresh_tokens, confirmations, "Sweep finished");

        Ok(SweepReport {
            refresh_tokens,
            confirmations,
        })
    }
}
