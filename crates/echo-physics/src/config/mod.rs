// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Startup configuration: storage port, JSON config service and the typed
//! [`PhysicsConfig`] read once when a world is built.

mod fs;
mod physics;

use std::sync::{Mutex, PoisonError};

use rustc_hash::FxHashMap;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub use fs::FsConfigStore;
pub use physics::{
    BroadPhaseConfig, CcdConfig, EpaConfig, GjkConfig, IslandConfig, NarrowPhaseConfig,
    PhysicsConfig, PoolConfig, SolverConfig, PHYSICS_CONFIG_KEY,
};

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A value was read but is outside its allowed range.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Dotted path of the offending setting.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Thin service that serializes config values and delegates storage to a `ConfigStore`.
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Loads the physics settings, falling back to defaults when the store
    /// has none, and validates them.
    pub fn load_physics(&self) -> Result<PhysicsConfig, ConfigError> {
        let config: PhysicsConfig = self.load(PHYSICS_CONFIG_KEY)?.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }
}

/// In-memory `ConfigStore`, handy for tests and embedded defaults.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    entries: Mutex<FxHashMap<String, Vec<u8>>>,
}

impl MemoryConfigStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_yields_defaults() {
        let service = ConfigService::new(MemoryConfigStore::new());
        let config = service.load_physics().unwrap();
        assert_eq!(config, PhysicsConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let store = MemoryConfigStore::new();
        store
            .save_raw(
                PHYSICS_CONFIG_KEY,
                br#"{ "solver": { "iterations": 4, "use_warm_starting": false } }"#,
            )
            .unwrap();
        let config = ConfigService::new(store).load_physics().unwrap();
        assert_eq!(config.solver.iterations, 4);
        assert!(!config.solver.use_warm_starting);
        assert_eq!(config.solver.bias_factor, SolverConfig::default().bias_factor);
        assert_eq!(config.pools, PoolConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let store = MemoryConfigStore::new();
        store
            .save_raw(PHYSICS_CONFIG_KEY, br#"{ "solver": { "bias_factor": 3.0 } }"#)
            .unwrap();
        let err = ConfigService::new(store).load_physics();
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn save_then_load_round_trips() {
        let service = ConfigService::new(MemoryConfigStore::new());
        let mut config = PhysicsConfig::default();
        config.broad_phase.fat_margin = 0.5;
        service.save(PHYSICS_CONFIG_KEY, &config).unwrap();
        assert_eq!(service.load_physics().unwrap(), config);
    }

    #[test]
    fn poisoned_memory_store_keeps_serving_entries() {
        let store = std::sync::Arc::new(MemoryConfigStore::new());
        store.save_raw("k", b"1").unwrap();
        let holder = std::sync::Arc::clone(&store);
        let joined = std::thread::spawn(move || {
            let _guard = holder.entries.lock().unwrap();
            panic!("writer died while holding the store lock");
        })
        .join();
        assert!(joined.is_err());
        assert!(store.entries.is_poisoned());
        assert_eq!(store.load_raw("k").unwrap(), b"1".to_vec());
        store.save_raw("k", b"2").unwrap();
        assert_eq!(store.load_raw("k").unwrap(), b"2".to_vec());
    }
}
