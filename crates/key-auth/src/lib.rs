//! API key authentication on top of the `api-key` codec.
//!
//! - [`KeyStore`]: persistence of [`ApiKeyRecord`]s, indexed by short token,
//!   with in-memory and SQLite backends
//! - [`KeyIssuer`]: mints keys and stores only the digest of their secret
//! - [`Verifier`]: authenticates a presented key with a single indexed lookup
//!   and a constant-time digest comparison
//! - [`AuthConfig`]: YAML configuration wiring the above together
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use key_auth::{IssueRequest, KeyIssuer, MemoryKeyStore, Verifier, VerifierConfig};
//! use api_key::KeyFormat;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(MemoryKeyStore::new());
//! let format = KeyFormat::new("sk").with_namespace("mono");
//! let issuer = KeyIssuer::new(store.clone(), format).unwrap();
//! let issued = issuer.issue(IssueRequest::new("ci")).await.unwrap();
//!
//! let verifier = Verifier::new(store, VerifierConfig::new("sk"));
//! let principal = verifier.authenticate(&issued.key).await.unwrap();
//! assert_eq!(principal.namespace, "mono");
//! # });
//! ```

pub mod configuration;
mod error;
mod issuer;
mod record;
pub mod store;
mod verifier;

pub use configuration::{AuthConfig, StoreConfig};
pub use error::{
    AuthenticationError, ConfigError, IssueError, StoreError, StoreResult, VerifyError,
};
pub use issuer::{
    IssueRequest, IssuedKey, KeyGenerator, KeyIssuer, MAX_CREATE_ATTEMPTS, OsKeyGenerator,
};
pub use record::{ApiKeyRecord, Metadata, Principal};
pub use store::{KeyStore, MemoryKeyStore, SqliteKeyStore};
pub use verifier::{DEFAULT_LOOKUP_TIMEOUT, Verifier, VerifierConfig};
