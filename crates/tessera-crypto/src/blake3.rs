//! Domain-separated BLAKE3 hashing for Tessera.
//!
//! Every derivation uses one of the registered context strings in
//! [`contexts`], so a digest computed for one purpose can never be
//! replayed as a digest for another.

use crate::{CryptoError, Result};

/// Length in bytes of an invite-link checksum.
pub const CHECKSUM_LEN: usize = 4;

/// Registered BLAKE3 context strings.
pub mod contexts {
    pub const INVITE_LINK_CHECKSUM: &str = "Tessera v1 invite-link-checksum";
    pub const GROUP_ID_FINGERPRINT: &str = "Tessera v1 group-id-fingerprint";

    /// All registered context strings. Used for validation.
    pub const ALL_CONTEXTS: &[&str] = &[INVITE_LINK_CHECKSUM, GROUP_ID_FINGERPRINT];
}

/// Derive a key using BLAKE3's built-in key derivation mode.
///
/// # Arguments
///
/// * `context` - A registered context string (must start with "Tessera v1 ")
/// * `key_material` - The input key material
pub fn derive_key(context: &str, key_material: &[u8]) -> [u8; 32] {
    debug_assert!(
        is_registered_context(context),
        "unregistered BLAKE3 context {context:?}"
    );
    let mut out = [0u8; 32];
    let mut hasher = ::blake3::Hasher::new_derive_key(context);
    hasher.update(key_material);
    let hash = hasher.finalize();
    out.copy_from_slice(hash.as_bytes());
    out
}

/// Verify that a context string is registered.
pub fn is_registered_context(context: &str) -> bool {
    contexts::ALL_CONTEXTS.contains(&context)
}

/// Compute the truncated checksum appended to invite-link payloads.
///
/// `checksum = BLAKE3::derive_key("Tessera v1 invite-link-checksum", data)[..4]`
pub fn link_checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = derive_key(contexts::INVITE_LINK_CHECKSUM, data);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Verify a checksum produced by [`link_checksum`].
pub fn verify_link_checksum(data: &[u8], checksum: &[u8]) -> Result<()> {
    if checksum.len() != CHECKSUM_LEN {
        return Err(CryptoError::InvalidLength {
            expected: CHECKSUM_LEN,
            actual: checksum.len(),
        });
    }
    if link_checksum(data) != checksum {
        return Err(CryptoError::ChecksumMismatch);
    }
    Ok(())
}

/// Short, stable fingerprint of a group identifier for log output.
///
/// Logs never carry the raw identifier; the fingerprint is enough to
/// correlate lines belonging to one join attempt.
pub fn group_fingerprint(group_id: &[u8]) -> String {
    let digest = derive_key(contexts::GROUP_ID_FINGERPRINT, group_id);
    digest[..6].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_context_strings_registered() {
        for ctx in contexts::ALL_CONTEXTS {
            assert!(
                ctx.starts_with("Tessera v1 "),
                "Context string '{ctx}' has wrong prefix"
            );
        }
        assert!(is_registered_context("Tessera v1 invite-link-checksum"));
        assert!(!is_registered_context("Tessera v1 made-up-context"));
    }

    #[test]
    fn test_derive_key_different_contexts() {
        let key1 = derive_key(contexts::INVITE_LINK_CHECKSUM, &[0u8; 32]);
        let key2 = derive_key(contexts::GROUP_ID_FINGERPRINT, &[0u8; 32]);
        assert_ne!(key1, key2);
        assert_ne!(key1, *::blake3::hash(&[0u8; 32]).as_bytes());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unregistered BLAKE3 context")]
    fn test_derive_key_rejects_unregistered_context() {
        derive_key("Tessera v1 made-up-context", b"data");
    }

    #[test]
    fn test_checksum_accepts_own_output() {
        let data = b"\x02payload";
        let sum = link_checksum(data);
        assert!(verify_link_checksum(data, &sum).is_ok());
    }

    #[test]
    fn test_checksum_detects_flipped_bit() {
        let sum = link_checksum(b"\x02payload");
        let result = verify_link_checksum(b"\x02paylOad", &sum);
        assert!(matches!(result, Err(CryptoError::ChecksumMismatch)));
    }

    #[test]
    fn test_checksum_wrong_length() {
        let result = verify_link_checksum(b"data", &[0u8; 3]);
        assert!(matches!(
            result,
            Err(CryptoError::InvalidLength {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_fingerprint_is_short_hex() {
        let fp = group_fingerprint(&[7u8; 32]);
        assert_eq!(fp.len(), 12);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, group_fingerprint(&[7u8; 32]));
    }
}
