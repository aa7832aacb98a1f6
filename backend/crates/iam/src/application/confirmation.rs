//! Email Confirmation Workflow
//!
//! Issues single-use confirmation secrets and redeems them. Only the hash
//! of `user_id:code` is stored; the plaintext exists in the outgoing mail.

use askama::Template;
use platform::crypto::{numeric_code, random_hex, sha256_hex};

use crate::application::context::IamContext;
use crate::domain::entity::{ConfirmationStatus, EmailConfirmation, User};
use crate::domain::mailer::MailContent;
use crate::domain::repository::IamStore;
use crate::domain::value_object::{ConfirmationChannel, SignupSource, UserId};
use crate::error::{IamError, IamResult};

/// Random bytes behind a link token (64 hex characters)
pub const LINK_TOKEN_BYTES: usize = 32;
/// Digits in a typed confirmation code
pub const CODE_DIGITS: u32 = 6;
/// Path the web confirmation link points at
pub const CONFIRM_EMAIL_PATH: &str = "/api/v1/auth/confirm-email";

#[derive(Template)]
#[template(path = "confirm_email_link.html")]
struct LinkMail<'a> {
    name: &'a str,
    link: &'a str,
    hours: u64,
}

#[derive(Template)]
#[template(path = "confirm_email_code.html")]
struct CodeMail<'a> {
    name: &'a str,
    code: &'a str,
    hours: u64,
}

/// A freshly issued confirmation and the mail that carries it
#[derive(Debug, Clone)]
pub struct IssuedConfirmation {
    pub code: String,
    pub mail: MailContent,
}

pub struct ConfirmationWorkflow<S: IamStore> {
    ctx: IamContext<S>,
}

impl<S: IamStore> Clone for ConfirmationWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<S: IamStore> ConfirmationWorkflow<S> {
    pub fn new(ctx: IamContext<S>) -> Self {
        Self { ctx }
    }

    /// Storage form of a confirmation secret
    pub fn code_hash(user_id: &UserId, code: &str) -> String {
        sha256_hex(format!("{user_id}:{code}").as_bytes())
    }

    /// Generate a secret for `user`, replacing any earlier one
    pub async fn issue(
        &self,
        tx: &mut S::Tx,
        user: &User,
        source: SignupSource,
    ) -> IamResult<IssuedConfirmation> {
        let now = self.ctx.now();
        let code = match source.channel() {
            ConfirmationChannel::Link => random_hex(self.ctx.random.as_ref(), LINK_TOKEN_BYTES),
            ConfirmationChannel::Code => numeric_code(self.ctx.random.as_ref(), CODE_DIGITS),
        };

        let confirmation = EmailConfirmation {
            id: self.ctx.new_id(),
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            code_hash: Self::code_hash(&user.user_id, &code),
            source,
            expires_at: self.ctx.expiry(now, self.ctx.config.confirmation_ttl)?,
            used_at: None,
            created_at: now,
        };
        self.ctx.store.upsert_confirmation(tx, &confirmation).await?;

        tracing::debug!(
            user_id = %user.user_id,
            source = %source,
            "Email confirmation issued"
        );

        let mail = self.render(user, &code, source)?;
        Ok(IssuedConfirmation { code, mail })
    }

    /// Redeem `code` for `user_id` and mark the email verified
    ///
    /// Fails with NotFound, Expired or AlreadyUsed, checked in that order.
    pub async fn redeem(&self, tx: &mut S::Tx, user_id: &UserId, code: &str) -> IamResult<()> {
        let now = self.ctx.now();
        let store = &self.ctx.store;

        let confirmation = store
            .find_confirmation(tx, user_id, &Self::code_hash(user_id, code))
            .await?
            .ok_or(IamError::ConfirmationNotFound)?;

        match confirmation.status(now) {
            ConfirmationStatus::Expired => return Err(IamError::ConfirmationExpired),
            ConfirmationStatus::AlreadyUsed => return Err(IamError::ConfirmationAlreadyUsed),
            ConfirmationStatus::Redeemable => {}
        }

        if !store.mark_confirmation_used(tx, &confirmation.id, now).await? {
            return Err(IamError::ConfirmationAlreadyUsed);
        }
        if !store.mark_email_verified(tx, user_id, now).await? {
            return Err(IamError::UserNotFound);
        }

        tracing::info!(user_id = %user_id, "Email address confirmed");
        Ok(())
    }

    fn render(&self, user: &User, code: &str, source: SignupSource) -> IamResult<MailContent> {
        let name = user.first_name.as_str();
        let hours = self.ctx.config.confirmation_ttl.as_secs() / 3600;

        let mail = match source.channel() {
            ConfirmationChannel::Link => {
                let link = format!(
                    "{}{}?userId={}&code={}",
                    self.ctx.config.confirmation_base_url.trim_end_matches('/'),
                    CONFIRM_EMAIL_PATH,
                    user.user_id,
                    code
                );
                let body = LinkMail { name, link: &link, hours }.render().map_err(render_error)?;
                MailContent::html("Confirm Your Email Address - IAM", body)
            }
            ConfirmationChannel::Code => {
                let body = CodeMail { name, code, hours }.render().map_err(render_error)?;
                MailContent::html(format!("Your Confirmation Code - IAM ({})", source.label()), body)
            }
        };
        Ok(mail)
    }
}

fn render_error(e: askama::Error) -> IamError {
    IamError::Internal(format!("failed to render confirmation mail: {e}"))
}
