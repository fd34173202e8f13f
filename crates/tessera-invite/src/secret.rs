//! Join secret key material carried by an invite link.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a v1 join secret.
pub const V1_SECRET_LEN: usize = 16;

/// Shortest join secret accepted by v2 links.
pub const MIN_SECRET_LEN: usize = 16;

/// Longest join secret accepted by v2 links.
pub const MAX_SECRET_LEN: usize = 64;

/// Opaque join password. Wiped from memory on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct JoinSecret(Vec<u8>);

impl JoinSecret {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Generate a random secret of the default length.
    pub fn generate() -> Self {
        Self(tessera_crypto::random::random_bytes(V1_SECRET_LEN))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for JoinSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JoinSecret(<{} bytes redacted>)", self.0.len())
    }
}
