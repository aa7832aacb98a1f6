//! Sign Up Use Case
//!
//! Registers a new user in an existing tenant and sends the email
//! confirmation. The account cannot sign in until the address is confirmed.

use std::sync::Arc;

use platform::password::ClearTextPassword;

use crate::application::confirmation::ConfirmationWorkflow;
use crate::application::context::IamContext;
use crate::domain::entity::User;
use crate::domain::entity::user::normalize_name;
use crate::domain::mailer::Mailer;
use crate::domain::repository::IamStore;
use crate::domain::value_object::{Email, Role, SignupSource, TenantId, UserId};
use crate::error::{IamError, IamResult};

pub const SIGN_UP_MESSAGE: &str =
    "User account created successfully. Please check your email to confirm your account.";

/// Sign up input
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub tenant_id: String,
    /// `web`, `android` or `ios`
    pub source: String,
}

/// Sign up output
#[derive(Debug, Clone)]
pub struct SignUpOutput {
    pub user_id: UserId,
    pub message: String,
}

/// Sign up use case
pub struct SignUpUseCase<S: IamStore, M: Mailer> {
    ctx: IamContext<S>,
    confirmations: ConfirmationWorkflow<S>,
    mailer: Arc<M>,
}

impl<S: IamStore, M: Mailer> SignUpUseCase<S, M> {
    pub fn new(ctx: IamContext<S>, mailer: Arc<M>) -> Self {
        Self {
            confirmations: ConfirmationWorkflow::new(ctx.clone()),
            ctx,
            mailer,
        }
    }

    pub async fn execute(&self, input: SignUpInput) -> IamResult<SignUpOutput> {
        // Validate everything before touching the store
        let email = Email::new(input.email)?;
        let password = ClearTextPassword::new(input.password)
            .map_err(|e| IamError::InvalidInput(e.to_string()))?;
        let first_name = normalize_name(&input.first_name, "first name")?;
        let last_name = normalize_name(&input.last_name, "last name")?;
        let tenant_id = input.tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(IamError::InvalidInput("tenant id is required".into()));
        }
        let tenant_id = TenantId::new(tenant_id);
        let source: SignupSource = input.source.parse()?;

        let store = &self.ctx.store;
        let mut tx = store.begin().await?;

        self.ctx.require_tenant(&mut tx, &tenant_id).await?;

        // A verified account owns the address; an unverified one is replaced
        if let Some(existing) = store.find_user_by_email(&mut tx, &tenant_id, &email).await? {
            if existing.email_verified {
                return Err(IamError::DuplicateAccount);
            }
            store.delete_user(&mut tx, &existing.user_id).await?;
            tracing::info!(
                user_id = %existing.user_id,
                tenant_id = %tenant_id,
                "Replacing unverified account"
            );
        }

        let password_hash =
            password.hash(self.ctx.config.password_cost, self.ctx.config.pepper())?;

        let user = User::new(
            self.ctx.new_id(),
            tenant_id,
            email,
            password_hash,
            first_name,
            last_name,
            self.ctx.now(),
        );
        store.insert_user(&mut tx, &user).await?;
        store.assign_role(&mut tx, &user.user_id, &Role::User).await?;

        let issued = self.confirmations.issue(&mut tx, &user, source).await?;

        // Mail goes out before commit; a delivery failure undoes the sign-up
        if let Err(e) = self.mailer.send_email(&user.email, &issued.mail).await {
            store.rollback(tx).await?;
            return Err(e.into());
        }

        store.commit(tx).await?;

        tracing::info!(
            user_id = %user.user_id,
            tenant_id = %user.tenant_id,
            source = %source,
            "User signed up"
        );

        Ok(SignUpOutput {
            user_id: user.user_id,
            message: SIGN_UP_MESSAGE.to_string(),
        })
    }
}
