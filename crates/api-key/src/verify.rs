//! Secret verification with constant-time comparison.

use subtle::ConstantTimeEq;

use crate::hash::{SecretDigest, hash_secret};
use crate::parse::ParsedKey;
use crate::secret::Secret;

/// Verify a long secret against a stored digest.
///
/// Hashes `secret` and compares the result against `stored` without
/// short-circuiting on the first differing byte.
pub fn verify_secret(secret: &Secret, stored: &SecretDigest) -> bool {
    digests_equal(&hash_secret(secret), stored)
}

/// Verify the secret of a parsed key against a stored digest.
pub fn verify_parsed(parsed: &ParsedKey, stored: &SecretDigest) -> bool {
    verify_secret(parsed.long_secret(), stored)
}

/// Constant-time comparison of two digests.
pub fn digests_equal(a: &SecretDigest, b: &SecretDigest) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyFormat;
    use crate::hash::DIGEST_LEN;
    use crate::parse::parse;
    use crate::token::generate;

    #[test]
    fn test_verify_valid_secret() {
        let generated = generate(&KeyFormat::default()).unwrap();
        let stored = hash_secret(&generated.long_secret);
        assert!(verify_secret(&generated.long_secret, &stored));
    }

    #[test]
    fn test_verify_tampered_digest() {
        let generated = generate(&KeyFormat::default()).unwrap();
        let mut bytes = *hash_secret(&generated.long_secret).as_bytes();
        bytes[DIGEST_LEN - 1] ^= 0x01;
        assert!(!verify_secret(
            &generated.long_secret,
            &SecretDigest::from_bytes(bytes)
        ));
    }

    #[test]
    fn test_verify_other_key() {
        let first = generate(&KeyFormat::default()).unwrap();
        let second = generate(&KeyFormat::default()).unwrap();
        let stored = hash_secret(&first.long_secret);
        assert!(!verify_secret(&second.long_secret, &stored));
    }

    #[test]
    fn test_roundtrip() {
        let format = KeyFormat::new("sk").with_namespace("mono");
        let generated = generate(&format).unwrap();
        let stored = hash_secret(&generated.long_secret);

        let parsed = parse(&generated.key).unwrap();
        assert_eq!(parsed.short_token, generated.short_token);
        assert!(verify_parsed(&parsed, &stored));
    }

    #[test]
    fn test_digests_equal_checks_every_position() {
        let base = [0x5au8; DIGEST_LEN];
        let a = SecretDigest::from_bytes(base);
        assert!(digests_equal(&a, &SecretDigest::from_bytes(base)));
        for i in 0..DIGEST_LEN {
            let mut other = base;
            other[i] ^= 0x80;
            assert!(!digests_equal(&a, &SecretDigest::from_bytes(other)));
        }
    }
}
