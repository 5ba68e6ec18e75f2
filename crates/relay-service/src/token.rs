//! Room capability tokens.
//!
//! A token is derived from a room's name and password:
//!
//! ```text
//! digest = SHA-256(len(name) as u32 BE || name || password)
//! token  = first 8 bytes of digest as u64 BE, shifted down to 53 bits
//! ```
//!
//! The same digest is stored as the room's password hash, so creation and
//! join always agree on the token for identical credentials. Tokens fit in
//! 53 bits so JavaScript clients can carry them as plain JSON numbers.

use crate::errors::RelayError;
use ring::digest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of significant bits kept from the digest.
pub const TOKEN_BITS: u32 = 53;

/// Full credential digest, stored as a room's password hash.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CredentialDigest([u8; 32]);

impl CredentialDigest {
    /// Digest a name/password pair.
    #[must_use]
    pub fn compute(name: &str, password: &str) -> Self {
        // Length prefix keeps ("abcdef", "ghijkl") and ("abcdefg", "hijkl") apart.
        let name_len = u32::try_from(name.len()).unwrap_or(u32::MAX);

        let mut ctx = digest::Context::new(&digest::SHA256);
        ctx.update(&name_len.to_be_bytes());
        ctx.update(name.as_bytes());
        ctx.update(password.as_bytes());

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(ctx.finish().as_ref());
        Self(bytes)
    }

    /// The capability token carried by this digest.
    #[must_use]
    pub fn token(&self) -> Token {
        let [b0, b1, b2, b3, b4, b5, b6, b7, ..] = self.0;
        let prefix = u64::from_be_bytes([b0, b1, b2, b3, b4, b5, b6, b7]);
        Token(prefix >> (64 - TOKEN_BITS))
    }
}

impl fmt::Debug for CredentialDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialDigest([REDACTED])")
    }
}

/// Capability token that resolves to a room name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(u64);

impl Token {
    /// Derive the token for a name/password pair.
    #[must_use]
    pub fn derive(name: &str, password: &str) -> Self {
        CredentialDigest::compute(name, password).token()
    }

    /// Parse the string form sent on the duplex channel.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::InvalidToken` if the text is not an unsigned integer.
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        text.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| RelayError::InvalidToken)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for Token {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
