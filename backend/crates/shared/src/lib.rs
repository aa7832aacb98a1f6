//! Shared Kernel
//!
//! Vocabulary shared by every crate of the IAM backend:
//! - The error taxonomy and the boundary error type
//! - Typed identifiers
//!
//! Only things whose meaning is identical across all layers belong here.

pub mod error {
    pub mod app_error;
    pub mod kind;
}
pub mod id;
