//! Random secrets from the OS CSPRNG.

use rand::RngCore;

/// Generate `len` random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_values_differ() {
        assert_ne!(random_bytes(32), random_bytes(32));
        assert_eq!(random_bytes(20).len(), 20);
    }
}
