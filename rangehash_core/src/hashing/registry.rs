//! Central registry for digest algorithm implementations

use super::traits::HashAlgorithmImpl;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Central registry for all digest algorithms, keyed by normalized name
pub struct AlgorithmRegistry {
    algorithms: RwLock<HashMap<String, Arc<dyn HashAlgorithmImpl>>>,
}

impl AlgorithmRegistry {
    /// Create a new empty registry
    fn new() -> Self {
        Self {
            algorithms: RwLock::new(HashMap::new()),
        }
    }

    /// Get the global registry instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceCell<AlgorithmRegistry> = OnceCell::new();
        INSTANCE.get_or_init(|| {
            let registry = Self::new();
            super::algorithms::register_all(&registry);
            registry
        })
    }

    /// Register an algorithm under its name and aliases
    pub fn register(&self, algorithm: impl HashAlgorithmImpl + 'static) {
        let algorithm: Arc<dyn HashAlgorithmImpl> = Arc::new(algorithm);
        let mut algorithms = self
            .algorithms
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        algorithms.insert(normalize(algorithm.name()), Arc::clone(&algorithm));
        for alias in algorithm.aliases() {
            algorithms.insert(normalize(alias), Arc::clone(&algorithm));
        }
    }

    /// Get algorithm by name or alias
    pub fn get(&self, name: &str) -> Option<Arc<dyn HashAlgorithmImpl>> {
        let algorithms = self
            .algorithms
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        algorithms.get(&normalize(name)).cloned()
    }

    /// Canonical names of all registered algorithms, sorted
    pub fn list(&self) -> Vec<&'static str> {
        let algorithms = self
            .algorithms
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = algorithms.values().map(|a| a.name()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_uppercase)
        .collect()
}
