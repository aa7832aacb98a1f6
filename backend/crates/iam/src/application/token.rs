//! Token Codec
//!
//! Access and refresh tokens are both HS256 JWTs signed with the configured
//! secret. A `typ` claim keeps one from being accepted as the other, and a
//! random nonce makes two tokens minted in the same second distinct.
//!
//! Expiry is checked against the engine clock rather than by jsonwebtoken,
//! so an injected clock governs validity.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::application::config::IamConfig;
use crate::domain::value_object::{Role, TenantId, UserId};
use crate::error::{IamError, IamResult};

/// Random bytes in each token's nonce
pub const NONCE_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub typ: TokenType,
    pub sub: UserId,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    header: Header,
}

impl TokenCodec {
    pub fn new(config: &IamConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding: EncodingKey::from_secret(&config.token_secret),
            decoding: DecodingKey::from_secret(&config.token_secret),
            validation,
            header: Header::new(Algorithm::HS256),
        }
    }

    pub fn sign(&self, claims: &Claims) -> IamResult<String> {
        encode(&self.header, claims, &self.encoding).map_err(|e| IamError::Signing(e.to_string()))
    }

    /// Check signature, issuer, type and expiry
    ///
    /// Every failure collapses to [`IamError::InvalidToken`].
    pub fn verify(&self, token: &str, expected: TokenType, now: DateTime<Utc>) -> IamResult<Claims> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                IamError::InvalidToken
            })?
            .claims;

        if claims.typ != expected {
            tracing::debug!(expected = ?expected, actual = ?claims.typ, "Token type mismatch");
            return Err(IamError::InvalidToken);
        }
        if claims.exp <= now.timestamp() {
            return Err(IamError::InvalidToken);
        }
        Ok(claims)
    }
}

/// Extract the credential from an `Authorization: Bearer <token>` value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
