use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use api_key::KeyFormat;

use crate::error::{ConfigError, StoreResult};
use crate::store::{KeyStore, MemoryKeyStore, SqliteKeyStore, is_in_memory_path};
use crate::verifier::VerifierConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub prefix: String,
    pub namespace: String,
    pub version: String,
    /// Bound on the store read during authentication, in milliseconds.
    pub lookup_timeout_ms: u64,
    pub reveal_expired: bool,
    pub store: StoreConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let format = KeyFormat::default();
        Self {
            prefix: format.prefix,
            namespace: format.namespace,
            version: format.version,
            lookup_timeout_ms: 2_000,
            reveal_expired: false,
            store: StoreConfig::Memory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    Sqlite {
        path: PathBuf,
        #[serde(default = "default_read_connections")]
        read_connections: usize,
    },
}

fn default_read_connections() -> usize {
    crate::store::DEFAULT_READ_CONNECTIONS
}

impl AuthConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: AuthConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.key_format().validate()?;
        if self.lookup_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "lookup_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if let StoreConfig::Sqlite {
            path,
            read_connections,
        } = &self.store
        {
            if *read_connections == 0 {
                return Err(ConfigError::Invalid(
                    "read_connections must be greater than zero".to_string(),
                ));
            }
            if is_in_memory_path(path) {
                return Err(ConfigError::Invalid(format!(
                    "sqlite path {:?} is in-memory; use `type: memory` instead",
                    path
                )));
            }
        }
        Ok(())
    }

    pub fn key_format(&self) -> KeyFormat {
        KeyFormat::new(&self.prefix)
            .with_namespace(&self.namespace)
            .with_version(&self.version)
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig::new(&self.prefix)
            .with_lookup_timeout(Duration::from_millis(self.lookup_timeout_ms))
            .with_reveal_expired(self.reveal_expired)
    }

    pub fn open_store(&self) -> StoreResult<Arc<dyn KeyStore>> {
        match &self.store {
            StoreConfig::Memory => Ok(Arc::new(MemoryKeyStore::new())),
            StoreConfig::Sqlite {
                path,
                read_connections,
            } => Ok(Arc::new(SqliteKeyStore::open(path, *read_connections)?)),
        }
    }
}
