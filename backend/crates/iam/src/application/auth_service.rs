//! Authentication Service
//!
//! Single entry point for the authentication flows. Each call runs its
//! use case in its own transaction and logs failures once, here.

use std::sync::Arc;

use crate::application::confirm_email::{ConfirmEmailInput, ConfirmEmailUseCase};
use crate::application::context::IamContext;
use crate::application::refresh::RefreshUseCase;
use crate::application::session::{Session, SessionManager};
use crate::application::sign_in::{SignInInput, SignInUseCase};
use crate::application::sign_out::SignOutUseCase;
use crate::application::sign_up::{SignUpInput, SignUpOutput, SignUpUseCase};
use crate::domain::mailer::Mailer;
use crate::domain::principal::Principal;
use crate::domain::repository::IamStore;
use crate::domain::value_object::UserId;
use crate::error::{IamError, IamResult};

pub struct AuthService<S: IamStore, M: Mailer> {
    sessions: SessionManager<S>,
    sign_up: SignUpUseCase<S, M>,
    sign_in: SignInUseCase<S>,
    sign_out: SignOutUseCase<S>,
    refresh: RefreshUseCase<S>,
    confirm_email: ConfirmEmailUseCase<S>,
}

impl<S: IamStore, M: Mailer> AuthService<S, M> {
    pub fn new(ctx: IamContext<S>, mailer: Arc<M>) -> Self {
        let sessions = SessionManager::new(ctx.clone());
        Self {
            sign_up: SignUpUseCase::new(ctx.clone(), mailer),
            sign_in: SignInUseCase::new(ctx.clone(), sessions.clone()),
            sign_out: SignOutUseCase::new(ctx.clone(), sessions.clone()),
            refresh: RefreshUseCase::new(ctx.clone(), sessions.clone()),
            confirm_email: ConfirmEmailUseCase::new(ctx),
            sessions,
        }
    }

    pub async fn sign_up(&self, input: SignUpInput) -> IamResult<SignUpOutput> {
        self.sign_up.execute(input).await.inspect_err(IamError::log)
    }

    pub async fn sign_in(&self, input: SignInInput) -> IamResult<Session> {
        self.sign_in.execute(input).await.inspect_err(IamError::log)
    }

    pub async fn sign_out(&self, user_id: &UserId) -> IamResult<u64> {
        self.sign_out.execute(user_id).await.inspect_err(IamError::log)
    }

    pub async fn refresh(&self, refresh_token: &str) -> IamResult<Session> {
        self.refresh.execute(refresh_token).await.inspect_err(IamError::log)
    }

    pub async fn confirm_email(&self, input: ConfirmEmailInput) -> IamResult<String> {
        self.confirm_email.execute(input).await.inspect_err(IamError::log)
    }

    /// Subject of a valid access token
    pub fn validate_access(&self, token: &str) -> IamResult<UserId> {
        self.sessions.validate_access(token).inspect_err(IamError::log)
    }

    /// Principal carried by a valid access token or `Bearer` header value
    pub fn authenticate(&self, credential: &str) -> IamResult<Principal> {
        self.sessions.authenticate(credential).inspect_err(IamError::log)
    }
}
