//! Application Configuration
//!
//! Configuration for the IAM application layer.

use std::fmt;
use std::time::Duration;

use platform::password::PasswordCost;
use platform::random::{OsRandom, SecureRandom};

/// IAM engine configuration
#[derive(Clone)]
pub struct IamConfig {
    /// HMAC key for signing access and refresh tokens (32 bytes)
    pub token_secret: [u8; 32],
    /// `iss` claim written into and required from every token
    pub issuer: String,
    /// Access token lifetime (1 hour)
    pub access_token_ttl: Duration,
    /// Refresh token lifetime (30 days)
    pub refresh_token_ttl: Duration,
    /// Active refresh tokens a user may hold, the newly issued one included
    pub max_active_sessions: usize,
    /// Confirmation code lifetime (24 hours)
    pub confirmation_ttl: Duration,
    /// Origin used to build confirmation links for web sign-ups
    pub confirmation_base_url: String,
    /// Argon2 parameters for new password hashes
    pub password_cost: PasswordCost,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
}

impl Default for IamConfig {
    fn default() -> Self {
        Self {
            token_secret: [0u8; 32],
            issuer: "iam".to_string(),
            access_token_ttl: Duration::from_secs(3600), // 1 hour
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600), // 30 days
            max_active_sessions: 2,
            confirmation_ttl: Duration::from_secs(24 * 3600), // 24 hours
            confirmation_base_url: "http://localhost:8080".to_string(),
            password_cost: PasswordCost::default(),
            password_pepper: None,
        }
    }
}

impl IamConfig {
    /// Create config with a random token secret (for development)
    pub fn with_random_secret() -> Self {
        let mut secret = [0u8; 32];
        OsRandom.fill_bytes(&mut secret);
        Self {
            token_secret: secret,
            ..Default::default()
        }
    }

    /// Development preset: random secret and a cheap password hash
    pub fn development() -> Self {
        Self {
            password_cost: PasswordCost::minimal(),
            ..Self::with_random_secret()
        }
    }

    /// Get pepper as byte slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }

    /// Older active sessions kept when a new one is issued
    pub fn sessions_to_keep(&self) -> usize {
        self.max_active_sessions.max(1) - 1
    }
}

impl fmt::Debug for IamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamConfig")
            .field("token_secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("max_active_sessions", &self.max_active_sessions)
            .field("confirmation_ttl", &self.confirmation_ttl)
            .field("confirmation_base_url", &self.confirmation_base_url)
            .field("password_cost", &self.password_cost)
            .field("password_pepper", &self.password_pepper.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IamConfig::default();
        assert_eq!(config.access_token_ttl, Duration::from_secs(3600));
        assert_eq!(config.refresh_token_ttl, Duration::from_secs(2_592_000));
        assert_eq!(config.confirmation_ttl, Duration::from_secs(86_400));
        assert_eq!(config.max_active_sessions, 2);
        assert_eq!(config.sessions_to_keep(), 1);
    }

    #[test]
    fn test_session_bound_never_underflows() {
        let config = IamConfig {
            max_active_sessions: 0,
            ..Default::default()
        };
        assert_eq!(config.sessions_to_keep(), 0);
    }

    #[test]
    fn test_random_secret_and_redacted_debug() {
        let config = IamConfig::with_random_secret();
        assert_ne!(config.token_secret, [0u8; 32]);
        let printed = format!("{:?}", config);
        assert!(printed.contains("[REDACTED]"));
    }
}
