use ring::hmac;

pub const HMAC_LEN: usize = 20;

/// Computes the HMAC-SHA1 tag over `payload` (the leading 53 bytes of a
/// DMRD frame) keyed by the shared passphrase.
pub fn sign(payload: &[u8], passphrase: &str) -> [u8; HMAC_LEN] {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, passphrase.as_bytes());
    let tag = hmac::sign(&key, payload);
    let mut out = [0u8; HMAC_LEN];
    out.copy_from_slice(tag.as_ref());
    out
}

/// `true` iff `tag` is the correct HMAC-SHA1 of `payload` under `passphrase`.
/// Uses `ring`'s constant-time comparison internally.
pub fn verify(payload: &[u8], passphrase: &str, tag: &[u8]) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, passphrase.as_bytes());
    hmac::verify(&key, payload, tag).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_its_own_signature() {
        let payload = [0xABu8; 53];
        let tag = sign(&payload, "password");
        assert!(verify(&payload, "password", &tag));
    }

    #[test]
    fn verify_rejects_a_different_key() {
        let payload = [0xABu8; 53];
        let tag = sign(&payload, "password");
        assert!(!verify(&payload, "wrongpass", &tag));
    }

    #[test]
    fn verify_rejects_a_tampered_payload() {
        let payload = [0xABu8; 53];
        let tag = sign(&payload, "password");
        let mut tampered = payload;
        tampered[0] ^= 0xFF;
        assert!(!verify(&tampered, "password", &tag));
    }
}
