//! Cryptographic Utilities

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::random::SecureRandom;

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 as lowercase hex, the storage form of every token hash
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// `len` random bytes rendered as hex (`2 * len` characters)
pub fn random_hex(rng: &dyn SecureRandom, len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Uniform decimal code with exactly `digits` digits (leading zeros kept)
///
/// Uses rejection sampling so every code is equally likely.
pub fn numeric_code(rng: &dyn SecureRandom, digits: u32) -> String {
    let digits = digits.clamp(1, 9);
    let modulus = 10u32.pow(digits);
    // Largest multiple of `modulus` that fits in u32
    let zone = u32::MAX - (u32::MAX % modulus);
    loop {
        let mut buf = [0u8; 4];
        rng.fill_bytes(&mut buf);
        let n = u32::from_be_bytes(buf);
        if n < zone {
            return format!("{:0width$}", n % modulus, width = digits as usize);
        }
    }
}

/// Random (version 4) UUID drawn from the given source
pub fn random_uuid(rng: &dyn SecureRandom) -> Uuid {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{OsRandom, SeededRandom};

    #[test]
    fn test_sha256_known_values() {
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);

        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_random_hex_is_lowercase_and_seeded() {
        let a = random_hex(&SeededRandom::new(7), 16);
        let b = random_hex(&SeededRandom::new(7), 16);
        assert_eq!(a, b);
        assert_eq!(a, a.to_lowercase());
        assert_eq!(hex::decode(&a).unwrap().len(), 16);
    }

    #[test]
    fn test_random_hex_length() {
        let token = random_hex(&OsRandom, 32);
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_numeric_code_shape() {
        let rng = SeededRandom::new(42);
        for _ in 0..200 {
            let code = numeric_code(&rng, 6);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_numeric_code_is_seed_deterministic() {
        let a = numeric_code(&SeededRandom::new(3), 6);
        let b = numeric_code(&SeededRandom::new(3), 6);
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_uuid_is_v4() {
        let id = random_uuid(&SeededRandom::new(1));
        assert_eq!(id.get_version_num(), 4);
    }
}
