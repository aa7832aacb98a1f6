//! Password Hashing and Verification
//!
//! - Argon2id hashing with a per-hash random salt and tunable cost
//! - PHC string storage (algorithm, version, cost and salt travel with the hash)
//! - Zeroization of clear text on drop
//! - Optional application-wide pepper

use std::fmt;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

// ============================================================================
// Constants
// ============================================================================

/// Minimum password length in code points
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length in code points
pub const MAX_PASSWORD_LENGTH: usize = 128;

// ============================================================================
// Error Types
// ============================================================================

/// Password policy violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("password must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    #[error("password must be at most {max} characters (got {actual})")]
    TooLong { max: usize, actual: usize },

    #[error("password cannot be empty or contain only whitespace")]
    EmptyOrWhitespace,

    #[error("password contains invalid control characters")]
    InvalidCharacter,

    #[error("password is too common or follows a predictable pattern")]
    CommonPattern,
}

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("password hashing failed: {0}")]
    HashingFailed(String),

    #[error("invalid argon2 cost parameters: {0}")]
    InvalidCost(String),

    #[error("invalid password hash format")]
    InvalidHashFormat,
}

// ============================================================================
// Cost
// ============================================================================

/// Argon2id cost parameters
///
/// The cost used at hashing time is embedded in the PHC string, so raising
/// it never invalidates existing hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordCost {
    /// Memory in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordCost {
    /// OWASP baseline: m=19456 (19 MiB), t=2, p=1
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl PasswordCost {
    /// Smallest cost argon2 accepts. For tests only.
    pub const fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn hasher(&self) -> Result<Argon2<'static>, PasswordHashError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| PasswordHashError::InvalidCost(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// Not `Clone`, and `Debug` output is redacted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Create a new clear text password with policy validation
    ///
    /// The input is NFKC-normalized first, then checked for:
    /// - length between [`MIN_PASSWORD_LENGTH`] and [`MAX_PASSWORD_LENGTH`] code points
    /// - no control characters other than space, tab and newline
    /// - not empty or whitespace only
    /// - not a well-known weak pattern
    ///
    /// ## Errors
    /// The first [`PasswordPolicyError`] the input violates.
    ///
    /// ## Examples
    /// ```rust
    /// use platform::password::{ClearTextPassword, PasswordPolicyError};
    ///
    /// assert!(ClearTextPassword::new("Tr0ub4dor&3".to_string()).is_ok());
    /// assert!(matches!(
    ///     ClearTextPassword::new("short".to_string()),
    ///     Err(PasswordPolicyError::TooShort { .. })
    /// ));
    /// ```
    pub fn new(raw: String) -> Result<Self, PasswordPolicyError> {
        let raw = Zeroizing::new(raw);
        let normalized: String = raw.nfkc().collect();
        let candidate = Self(normalized);

        if candidate.0.trim().is_empty() {
            return Err(PasswordPolicyError::EmptyOrWhitespace);
        }

        let char_count = candidate.0.chars().count();
        if char_count < MIN_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: MIN_PASSWORD_LENGTH,
                actual: char_count,
            });
        }
        if char_count > MAX_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooLong {
                max: MAX_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        if candidate
            .0
            .chars()
            .any(|ch| ch.is_control() && ch != '\t' && ch != '\n')
        {
            return Err(PasswordPolicyError::InvalidCharacter);
        }

        if is_common_pattern(&candidate.0) {
            return Err(PasswordPolicyError::CommonPattern);
        }

        Ok(candidate)
    }

    /// Wrap input without the policy checks
    ///
    /// Sign-in uses this: a password that predates a policy change must
    /// still be comparable against its stored hash.
    pub fn unchecked(raw: String) -> Self {
        let raw = Zeroizing::new(raw);
        Self(raw.nfkc().collect())
    }

    fn peppered(&self, pepper: Option<&[u8]>) -> Zeroizing<Vec<u8>> {
        let mut bytes = self.0.as_bytes().to_vec();
        if let Some(p) = pepper {
            bytes.extend_from_slice(p);
        }
        Zeroizing::new(bytes)
    }

    /// Hash the password using Argon2id
    ///
    /// ## Arguments
    /// * `cost` - Argon2 parameters
    /// * `pepper` - Optional application-wide secret appended before hashing
    ///
    /// ## Returns
    /// A PHC string with a fresh OS-random salt, so hashing the same
    /// password twice gives two different strings.
    pub fn hash(
        &self,
        cost: PasswordCost,
        pepper: Option<&[u8]>,
    ) -> Result<HashedPassword, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = cost
            .hasher()?
            .hash_password(&self.peppered(pepper), &salt)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword {
            hash: hash.to_string(),
        })
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// Hashed password in PHC string format
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Create from PHC string (e.g., from database)
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();
        PasswordHash::new(&hash).map_err(|_| PasswordHashError::InvalidHashFormat)?;
        Ok(Self { hash })
    }

    /// Storage form (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`)
    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }

    /// Verify a password against this hash
    ///
    /// The cost parameters are read from the hash itself. Argon2 compares
    /// the digests in constant time.
    ///
    /// ## Arguments
    /// * `password` - candidate, usually built with [`ClearTextPassword::unchecked`]
    /// * `pepper` - must be the pepper used at hashing time
    ///
    /// ## Examples
    /// ```rust
    /// use platform::password::{ClearTextPassword, PasswordCost};
    ///
    /// let hash = ClearTextPassword::new("Tr0ub4dor&3".to_string())
    ///     .unwrap()
    ///     .hash(PasswordCost::minimal(), None)
    ///     .unwrap();
    /// assert!(hash.verify(&ClearTextPassword::unchecked("Tr0ub4dor&3".to_string()), None));
    /// assert!(!hash.verify(&ClearTextPassword::unchecked("wrong".to_string()), None));
    /// ```
    pub fn verify(&self, password: &ClearTextPassword, pepper: Option<&[u8]>) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(&password.peppered(pepper), &parsed_hash)
            .is_ok()
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn is_common_pattern(password: &str) -> bool {
    let lower = password.to_lowercase();

    // One repeated character ("aaaaaaaa")
    let mut chars = lower.chars();
    if let Some(first) = chars.next() {
        if chars.all(|c| c == first) {
            return true;
        }
    }

    if is_sequential_numbers(&lower) {
        return true;
    }

    const KEYBOARD_PATTERNS: &[&str] = &[
        "qwerty",
        "asdfgh",
        "zxcvbn",
        "qazwsx",
        "1qaz2wsx",
    ];
    if KEYBOARD_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }

    const COMMON_PASSWORDS: &[&str] = &[
        "password",
        "password1",
        "password123",
        "abcdefgh",
        "letmein1",
        "welcome1",
        "admin123",
        "iloveyou",
        "sunshine",
        "princess",
        "football",
        "baseball",
        "trustno1",
    ];
    COMMON_PASSWORDS.contains(&lower.as_str())
}

/// Digits only, ascending or descending by one ("12345678", "98765432")
fn is_sequential_numbers(s: &str) -> bool {
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 4 {
        return false;
    }

    let ascending = digits
        .windows(2)
        .all(|w| w[1] == (w[0] + 1) % 10);
    let descending = digits
        .windows(2)
        .all(|w| w[0] == (w[1] + 1) % 10);

    ascending || descending
}

// ============================================================================
// Tests
// ============================================================================
