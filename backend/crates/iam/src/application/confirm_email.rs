//! Confirm Email Use Case

use crate::application::confirmation::ConfirmationWorkflow;
use crate::application::context::IamContext;
use crate::domain::repository::IamStore;
use crate::domain::value_object::UserId;
use crate::error::{IamError, IamResult};

pub const CONFIRMED_MESSAGE: &str = "Email confirmed successfully. You can now sign in.";

/// Confirm email input
pub struct ConfirmEmailInput {
    pub user_id: String,
    pub code: String,
}

/// Confirm email use case
pub struct ConfirmEmailUseCase<S: IamStore> {
    ctx: IamContext<S>,
    confirmations: ConfirmationWorkflow<S>,
}

impl<S: IamStore> ConfirmEmailUseCase<S> {
    pub fn new(ctx: IamContext<S>) -> Self {
        Self {
            confirmations: ConfirmationWorkflow::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn execute(&self, input: ConfirmEmailInput) -> IamResult<String> {
        let user_id = input.user_id.trim();
        if user_id.is_empty() {
            return Err(IamError::InvalidInput("user id is required".into()));
        }
        let code = input.code.trim();
        if code.is_empty() {
            return Err(IamError::InvalidInput("confirmation code is required".into()));
        }
        let user_id = UserId::new(user_id);

        let mut tx = self.ctx.store.begin().await?;
        self.confirmations.redeem(&mut tx, &user_id, code).await?;
        self.ctx.store.commit(tx).await?;

        Ok(CONFIRMED_MESSAGE.to_string())
    }
}
