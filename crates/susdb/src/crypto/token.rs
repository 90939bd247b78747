//! Secured token generation.
//!
//! A secured token is a bearer credential handed back to the identity owner
//! after `store` and `recover`; presenting it authorizes `close`. Tokens are
//! base58 encodings of a fresh UUIDv4 (122 random bits), 21 or 22
//! characters long. They are never derived from the secret's hash.

use uuid::Uuid;

/// Produces secured tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenGenerator;

impl TokenGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a new token.
    pub fn generate(&self) -> String {
        bs58::encode(Uuid::new_v4().as_bytes()).into_string()
    }
}

/// Compare a presented token against the stored one.
///
/// Plain byte equality, evaluated over the whole length without early exit.
pub fn tokens_match(presented: &str, stored: &str) -> bool {
    let a = presented.as_bytes();
    let b = stored.as_bytes();
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
