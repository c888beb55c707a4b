//! In-memory tenant registry keyed by subdomain. Listing keeps first-registration order.

use super::config::TenantConfig;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Entries {
    by_subdomain: HashMap<String, TenantConfig>,
    order: Vec<String>,
}

/// Thread-safe registry. Share it behind the owning `TenantRouter`.
#[derive(Default)]
pub struct TenantRegistry {
    entries: RwLock<Entries>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        TenantRegistry::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite. Returns the config that was replaced, if any.
    pub fn register(&self, config: TenantConfig) -> Option<TenantConfig> {
        let mut entries = self.write();
        let subdomain = config.subdomain.clone();
        let previous = entries.by_subdomain.insert(subdomain.clone(), config);
        if previous.is_none() {
            entries.order.push(subdomain);
        }
        previous
    }

    pub fn unregister(&self, subdomain: &str) -> Option<TenantConfig> {
        let mut entries = self.write();
        let removed = entries.by_subdomain.remove(subdomain);
        if removed.is_some() {
            entries.order.retain(|s| s != subdomain);
        }
        removed
    }

    pub fn lookup(&self, subdomain: &str) -> Option<TenantConfig> {
        self.read().by_subdomain.get(subdomain).cloned()
    }

    pub fn contains(&self, subdomain: &str) -> bool {
        self.read().by_subdomain.contains_key(subdomain)
    }

    pub fn list(&self) -> Vec<TenantConfig> {
        let entries = self.read();
        entries
            .order
            .iter()
            .filter_map(|s| entries.by_subdomain.get(s).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().by_subdomain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().by_subdomain.is_empty()
    }
}
