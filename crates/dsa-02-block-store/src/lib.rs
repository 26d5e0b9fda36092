//! # Block Store - Per-Source Block Flags
//!
//! Shared block-list between the ingestion gateway (sole writer, reads on
//! every admission) and operators. Two operations only: `get` and
//! `set_blocked`. Flags are monotonic; nothing in this crate clears one.
//!
//! Backends are picked from the store address:
//!
//! | Address | Backend |
//! |---------|---------|
//! | `memory://` | [`InMemoryBlockStore`] |
//! | `redis://host:port[/db]` | [`RedisBlockStore`] |

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod memory;
pub mod ports;
pub mod redis_store;

pub use error::StoreError;
pub use memory::InMemoryBlockStore;
pub use ports::BlockStore;
pub use redis_store::RedisBlockStore;

use std::sync::Arc;
use std::time::Duration;

/// Default key namespace in shared stores.
pub const DEFAULT_KEY_PREFIX: &str = "dsa:block";

/// Block store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `memory://` or `redis://host:port[/db]`.
    pub address: String,
    pub key_prefix: String,
    pub connect_timeout: Duration,
    /// Bound on every single `get` / `set_blocked`.
    pub op_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: "memory://".to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            connect_timeout: Duration::from_secs(1),
            op_timeout: Duration::from_millis(200),
        }
    }
}

/// Backend named by a store address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl StoreBackend {
    pub fn from_address(address: &str) -> Result<Self, StoreError> {
        let Some((scheme, _)) = address.split_once("://") else {
            return Err(StoreError::InvalidAddress {
                address: address.to_string(),
                reason: "expected <scheme>://".into(),
            });
        };
        match scheme.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" | "rediss" => Ok(StoreBackend::Redis),
            other => Err(StoreError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Build the store named by `config.address`.
///
/// Fails only on a malformed or unsupported address. Reachability is checked
/// lazily by the first operation.
pub fn open_block_store(config: &StoreConfig) -> Result<Arc<dyn BlockStore>, StoreError> {
    match StoreBackend::from_address(&config.address)? {
        StoreBackend::Memory => Ok(Arc::new(InMemoryBlockStore::new())),
        StoreBackend::Redis => Ok(Arc::new(RedisBlockStore::new(
            &config.address,
            &config.key_prefix,
            config.connect_timeout,
            config.op_timeout,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Classify, ErrorClass};

    #[test]
    fn test_backend_from_address() {
        assert_eq!(StoreBackend::from_address("memory://").unwrap(), StoreBackend::Memory);
        assert_eq!(
            StoreBackend::from_address("redis://localhost:6379").unwrap(),
            StoreBackend::Redis
        );
    }

    #[test]
    fn test_bad_addresses_are_startup_errors() {
        for address in ["localhost:6379", "etcd://localhost:2379"] {
            let err = StoreBackend::from_address(address).unwrap_err();
            assert_eq!(err.class(), ErrorClass::IrrecoverableStartup, "{address}");
        }
    }

    #[test]
    fn test_open_memory_store() {
        let store = open_block_store(&StoreConfig::default()).unwrap();
        assert_eq!(store.backend(), "memory");
    }
}
