//! # tessera-crypto
//!
//! Cryptographic helpers shared by the Tessera crates.
//!
//! ## Modules
//!
//! - [`blake3`]: Domain-separated BLAKE3 hashing and invite-link checksums
//! - [`random`]: OS-backed random secrets

pub mod blake3;
pub mod random;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A checksum did not match the data it covers.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Invalid input length.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, CryptoError>;
