//! Session Manager
//!
//! Issues access/refresh token pairs, rotates refresh tokens and keeps the
//! number of active sessions per user bounded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::crypto::{random_hex, sha256_hex};
use serde::Serialize;

use crate::application::context::IamContext;
use crate::application::token::{Claims, NONCE_BYTES, TokenCodec, TokenType, bearer_token};
use crate::domain::entity::{RefreshToken, User};
use crate::domain::principal::Principal;
use crate::domain::repository::IamStore;
use crate::domain::value_object::UserId;
use crate::error::{IamError, IamResult};

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Token pair handed to a caller after sign-in or refresh
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub user_id: UserId,
}

pub struct SessionManager<S: IamStore> {
    ctx: IamContext<S>,
    codec: Arc<TokenCodec>,
}

impl<S: IamStore> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<S: IamStore> SessionManager<S> {
    pub fn new(ctx: IamContext<S>) -> Self {
        let codec = Arc::new(TokenCodec::new(&ctx.config));
        Self { ctx, codec }
    }

    /// Mint a token pair for `user` and record the refresh token
    ///
    /// Roles are read inside `tx`, so a refresh always carries the user's
    /// current roles.
    pub async fn issue_session(&self, tx: &mut S::Tx, user: &User) -> IamResult<Session> {
        let config = &self.ctx.config;
        let now = self.ctx.now();
        let roles = self.ctx.store.list_user_roles(tx, &user.user_id).await?;

        let access_expires_at = self.ctx.expiry(now, config.access_token_ttl)?;
        let access_token = self.codec.sign(&Claims {
            typ: TokenType::Access,
            sub: user.user_id.clone(),
            iss: config.issuer.clone(),
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
            nonce: self.nonce(),
            tenant_id: Some(user.tenant_id.clone()),
            roles,
        })?;

        let refresh_expires_at = self.ctx.expiry(now, config.refresh_token_ttl)?;
        let refresh_token = self.codec.sign(&Claims {
            typ: TokenType::Refresh,
            sub: user.user_id.clone(),
            iss: config.issuer.clone(),
            iat: now.timestamp(),
            exp: refresh_expires_at.timestamp(),
            nonce: self.nonce(),
            tenant_id: None,
            roles: Vec::new(),
        })?;

        self.cleanup(tx, &user.user_id, now).await?;

        self.ctx
            .store
            .insert_refresh_token(
                tx,
                &RefreshToken {
                    id: self.ctx.new_id(),
                    user_id: user.user_id.clone(),
                    token_hash: sha256_hex(refresh_token.as_bytes()),
                    issued_at: now,
                    expires_at: refresh_expires_at,
                    revoked: false,
                },
            )
            .await?;

        tracing::debug!(user_id = %user.user_id, "Session issued");

        Ok(Session {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: config.access_token_ttl.as_secs(),
            user_id: user.user_id.clone(),
        })
    }

    /// Exchange a refresh token for a new pair
    ///
    /// The presented row is revoked atomically before anything else, so a
    /// token can be redeemed at most once even under concurrent calls.
    pub async fn rotate(&self, tx: &mut S::Tx, refresh_token: &str) -> IamResult<Session> {
        let now = self.ctx.now();
        let claims = self.codec.verify(refresh_token, TokenType::Refresh, now)?;

        let token_hash = sha256_hex(refresh_token.as_bytes());
        let row = self
            .ctx
            .store
            .revoke_active_refresh_token(tx, &token_hash, now)
            .await?
            .ok_or(IamError::InvalidToken)?;

        if row.user_id != claims.sub {
            tracing::warn!(
                token_user = %claims.sub,
                row_user = %row.user_id,
                "Refresh token subject does not match its record"
            );
            return Err(IamError::InvalidToken);
        }

        let user = self
            .ctx
            .store
            .find_user(tx, &row.user_id)
            .await?
            .ok_or(IamError::InvalidToken)?;
        if !user.can_sign_in() {
            return Err(IamError::AccountDisabled);
        }

        let session = self.issue_session(tx, &user).await?;

        tracing::info!(user_id = %user.user_id, "Refresh token rotated");

        Ok(session)
    }

    /// Revoke every refresh token the user holds
    pub async fn revoke_all(&self, tx: &mut S::Tx, user_id: &UserId) -> IamResult<u64> {
        self.ctx.store.revoke_all_refresh_tokens(tx, user_id).await
    }

    /// Verify an access token and return its subject
    pub fn validate_access(&self, token: &str) -> IamResult<UserId> {
        Ok(self.verify_access(token)?.sub)
    }

    /// Rebuild the caller from an access token or `Authorization` header value
    pub fn authenticate(&self, credential: &str) -> IamResult<Principal> {
        let claims = self.verify_access(credential)?;
        let tenant_id = claims.tenant_id.ok_or(IamError::InvalidToken)?;
        Ok(Principal::new(claims.sub, tenant_id, claims.roles))
    }

    fn verify_access(&self, credential: &str) -> IamResult<Claims> {
        let token = bearer_token(credential).unwrap_or(credential.trim());
        if token.is_empty() {
            return Err(IamError::InvalidToken);
        }
        self.codec.verify(token, TokenType::Access, self.ctx.now())
    }

    /// Drop inactive rows, then the oldest active ones beyond the bound
    ///
    /// Runs before the new row is inserted, leaving room for it.
    async fn cleanup(&self, tx: &mut S::Tx, user_id: &UserId, now: DateTime<Utc>) -> IamResult<()> {
        let store = &self.ctx.store;
        let removed_inactive = store.delete_inactive_refresh_tokens(tx, user_id, now).await?;

        let active = store.list_active_refresh_tokens(tx, user_id, now).await?;
        let keep = self.ctx.config.sessions_to_keep();
        let excess: Vec<_> = active.into_iter().skip(keep).map(|t| t.id).collect();
        let removed_excess = if excess.is_empty() {
            0
        } else {
            store.delete_refresh_tokens(tx, &excess).await?
        };

        if removed_inactive + removed_excess > 0 {
            tracing::debug!(
                user_id = %user_id,
                removed_inactive,
                removed_excess,
                "Refresh tokens cleaned up"
            );
        }
        Ok(())
    }

    fn nonce(&self) -> String {
        random_hex(self.ctx.random.as_ref(), NONCE_BYTES)
    }
}
