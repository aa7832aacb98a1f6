//! Platform Crate - Technical Infrastructure
//!
//! Domain-free building blocks used by the IAM engine:
//! - Password hashing (Argon2id with tunable cost)
//! - Hashing and random token helpers
//! - Injectable clock and secure random source

pub mod clock;
pub mod crypto;
pub mod password;
pub mod random;
