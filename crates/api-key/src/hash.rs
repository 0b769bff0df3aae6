//! SHA3-256 hashing for long secrets.

use std::fmt;

use sha3::{Digest, Sha3_256};
use subtle::{Choice, ConstantTimeEq};

use crate::secret::Secret;

/// Size of a stored digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Domain label mixed in ahead of the secret. Changing it invalidates every
/// stored digest.
const HASH_DOMAIN: &[u8] = b"api-key/secret/v1\0";

/// One-way digest of a long secret, as persisted in place of the secret.
///
/// Equality is constant-time; `Debug` is redacted.
#[derive(Clone, Copy)]
pub struct SecretDigest([u8; DIGEST_LEN]);

impl SecretDigest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Rebuild a digest loaded from storage. Returns `None` on a length
    /// mismatch.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; DIGEST_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Raw digest bytes, for persistence only. Compare with `==`, which is
    /// constant-time.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl ConstantTimeEq for SecretDigest {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.ct_eq(&other.0)
    }
}

impl PartialEq for SecretDigest {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for SecretDigest {}

impl fmt::Debug for SecretDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretDigest([REDACTED])")
    }
}

/// Compute the storable digest of a long secret.
///
/// The secret is already high-entropy, so a single fast hash is enough; no
/// salt or work factor is applied.
pub fn hash_secret(secret: &Secret) -> SecretDigest {
    let mut hasher = Sha3_256::new();
    hasher.update(HASH_DOMAIN);
    hasher.update(secret.expose().as_bytes());

    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&hasher.finalize());
    SecretDigest(digest)
}
