//! Cryptographically-secure API key generation, parsing and secret hashing.
//!
//! This crate provides functionality for:
//! - Generating keys made of a random non-secret short token and a random
//!   256-bit long secret
//! - Parsing key strings back into their five segments
//! - Hashing long secrets for storage and comparing digests in constant time
//!
//! It does no I/O. Persisting keys and looking them up by short token is the
//! job of the `key-auth` crate.
//!
//! # Key Format
//!
//! Keys follow the format:
//! `{prefix}-{namespace}-{version}-{short_token}-{long_secret}`
//!
//! Example: `sk-mono-v1-q3zk7c4mla2e5rzb-ndf7...`
//!
//! - `short_token`: 16 base32 characters (80 random bits), stored in
//!   plaintext and indexed for lookup
//! - `long_secret`: 52 base32 characters (256 random bits), never stored;
//!   only its SHA3-256 digest is kept
//!
//! # Example
//!
//! ```rust
//! use api_key::{KeyFormat, generate, hash_secret, parse, verify_parsed};
//!
//! let format = KeyFormat::new("sk").with_namespace("mono");
//! let generated = generate(&format).unwrap();
//!
//! // Store the short token and the digest; hand the key to the user once.
//! let stored = hash_secret(&generated.long_secret);
//!
//! // Later, verify a presented key
//! let parsed = parse(&generated.key).unwrap();
//! assert_eq!(parsed.short_token, generated.short_token);
//! assert!(verify_parsed(&parsed, &stored));
//! ```

mod config;
mod error;
mod hash;
mod parse;
mod secret;
mod token;
mod verify;

// Public re-exports
pub use config::{KeyFormat, MAX_LABEL_LEN};
pub use error::{ApiKeyError, Malformed, Result, Segment};
pub use hash::{DIGEST_LEN, SecretDigest, hash_secret};
pub use parse::{DELIMITER, MAX_KEY_LEN, ParsedKey, encode, parse};
pub use secret::Secret;
pub use token::{
    GeneratedKey, LONG_SECRET_BYTES, LONG_SECRET_LEN, SHORT_TOKEN_BYTES, SHORT_TOKEN_LEN,
    generate,
};
pub use verify::{digests_equal, verify_parsed, verify_secret};
