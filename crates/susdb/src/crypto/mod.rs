//! Cryptographic primitives for SusDB.
//!
//! This module provides:
//! - Argon2id secret hashing and constant-time verification
//! - Secured token generation from independent randomness
//! - Cryptographically secure random number generation

pub mod hasher;
pub mod random;
pub mod token;

pub use hasher::{canonical_envelope, Hasher, HasherParams};
pub use token::{tokens_match, TokenGenerator};
