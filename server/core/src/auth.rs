//! §4.7 handshake cryptographic helpers. The login challenge is the one
//! place in this plaintext-insecure-by-protocol-design handshake where
//! cryptographic discipline matters (§9): the master generates a random
//! salt on RPTL, sends it with RPTACK, and must verify on RPTK that the
//! peer's returned challenge is `SHA-256(salt || passphrase)` before
//! admitting it to AUTHENTICATED.

use rand::RngCore;
use sha2::{Digest, Sha256};

pub const SALT_LEN: usize = 32;

/// Generates a fresh random login salt for a newly-registering peer.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Computes the expected RPTK challenge for `salt`/`passphrase`.
pub fn compute_challenge(salt: &[u8; SALT_LEN], passphrase: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(passphrase.as_bytes());
    hasher.finalize().into()
}

/// `true` iff `received` matches the expected challenge for `salt`/`passphrase`.
pub fn verify_challenge(salt: &[u8; SALT_LEN], passphrase: &str, received: &[u8; 32]) -> bool {
    compute_challenge(salt, passphrase) == *received
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_passphrase_verifies() {
        let salt = generate_salt();
        let challenge = compute_challenge(&salt, "s3cret");
        assert!(verify_challenge(&salt, "s3cret", &challenge));
    }

    #[test]
    fn wrong_passphrase_fails() {
        let salt = generate_salt();
        let challenge = compute_challenge(&salt, "s3cret");
        assert!(!verify_challenge(&salt, "wrong", &challenge));
    }

    #[test]
    fn salts_are_not_trivially_constant() {
        let a = generate_salt();
        let b = generate_salt();
        assert_ne!(a, b);
    }
}
