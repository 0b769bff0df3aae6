//! Zeroizing holder for the long secret.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The long secret segment of a key.
///
/// Memory is cleared on drop and `Debug`/`Display` never print the value.
/// There is no `Deref<Target = str>`; reading the value goes through
/// [`Secret::expose`].
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Take ownership of `value`; it is wiped when the `Secret` drops.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Borrow the raw secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for Secret {}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_redaction() {
        let secret = Secret::from("sensitivevalue".to_string());
        assert_eq!(format!("{:?}", secret), "Secret([REDACTED])");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose(), "sensitivevalue");
        assert_eq!(secret.len(), 14);
    }

    #[test]
    fn test_secret_equality() {
        let a = Secret::from("abc".to_string());
        let b = Secret::from("abc".to_string());
        let c = Secret::from("abd".to_string());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
