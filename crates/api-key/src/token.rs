//! Key generation.

use std::fmt;

use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, Zeroizing};

use crate::config::KeyFormat;
use crate::error::{ApiKeyError, Result};
use crate::parse::encode;
use crate::secret::Secret;

/// Random bytes behind a short token (80 bits).
pub const SHORT_TOKEN_BYTES: usize = 10;
/// Encoded short token length: base32 of 10 bytes.
pub const SHORT_TOKEN_LEN: usize = 16;
/// Random bytes behind a long secret (256 bits).
pub const LONG_SECRET_BYTES: usize = 32;
/// Encoded long secret length: base32 of 32 bytes, unpadded.
pub const LONG_SECRET_LEN: usize = 52;

/// A freshly generated key.
///
/// `key` is the only copy of the external string; hand it to the caller once
/// and store `short_token` plus the digest of `long_secret`.
pub struct GeneratedKey {
    pub key: Zeroizing<String>,
    pub short_token: String,
    pub long_secret: Secret,
}

impl fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("key", &"[REDACTED]")
            .field("short_token", &self.short_token)
            .field("long_secret", &self.long_secret)
            .finish()
    }
}

/// Generate a new key for `format`.
///
/// Both random segments come from the OS CSPRNG. A failing entropy source is
/// reported as [`ApiKeyError::EntropyExhausted`] and must not be retried.
pub fn generate(format: &KeyFormat) -> Result<GeneratedKey> {
    format.validate()?;

    let short_token = random_segment::<SHORT_TOKEN_BYTES>()?;
    let long_secret = Secret::new(random_segment::<LONG_SECRET_BYTES>()?);

    let key = Zeroizing::new(encode(
        &format.prefix,
        &format.namespace,
        &format.version,
        &short_token,
        long_secret.expose(),
    ));

    Ok(GeneratedKey {
        key,
        short_token,
        long_secret,
    })
}

/// `N` random bytes as lowercase unpadded base32.
fn random_segment<const N: usize>() -> Result<String> {
    let mut bytes = [0u8; N];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(ApiKeyError::EntropyExhausted)?;

    let mut encoded = BASE32_NOPAD.encode(&bytes);
    encoded.make_ascii_lowercase();
    bytes.zeroize();
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key_format() {
        let format = KeyFormat::new("sk").with_namespace("mono");
        let generated = generate(&format).unwrap();

        assert!(generated.key.starts_with("sk-mono-v1-"));
        let parts: Vec<&str> = generated.key.split('-').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[3], generated.short_token);
        assert_eq!(parts[3].len(), SHORT_TOKEN_LEN);
        assert_eq!(parts[4].len(), LONG_SECRET_LEN);
        assert_eq!(parts[4], generated.long_secret.expose());
    }

    #[test]
    fn test_segments_are_lowercase_alphanumeric() {
        let generated = generate(&KeyFormat::default()).unwrap();
        for segment in [generated.short_token.as_str(), generated.long_secret.expose()] {
            assert!(
                segment
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
            );
        }
    }

    #[test]
    fn test_generate_unique_keys() {
        let format = KeyFormat::default();
        let first = generate(&format).unwrap();
        let second = generate(&format).unwrap();
        assert_ne!(first.short_token, second.short_token);
        assert_ne!(first.long_secret, second.long_secret);
        assert_ne!(*first.key, *second.key);
    }

    #[test]
    fn test_generate_rejects_invalid_format() {
        let format = KeyFormat::new("s_k");
        assert!(matches!(
            generate(&format),
            Err(ApiKeyError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn test_debug_hides_key_and_secret() {
        let generated = generate(&KeyFormat::default()).unwrap();
        let out = format!("{:?}", generated);
        assert!(!out.contains(generated.long_secret.expose()));
        assert!(!out.contains(generated.key.as_str()));
        assert!(out.contains(&generated.short_token));
    }
}
