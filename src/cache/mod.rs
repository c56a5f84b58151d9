//! Shared TTL cache fronting Knowledge, Settings, and Workflow-Definitions
//! lookups (§4.5). Each aspect is independently enable/TTL-configurable;
//! disabling one skips both reads and writes for it.
//!
//! Grounded on the teacher's `dashmap = "5.5"` dependency (declared in
//! `Cargo.toml` for exactly this lock-free concurrent-map use case) in place
//! of the `std::sync::Mutex<HashMap<...>>` the teacher's own
//! `engine/nats_storage.rs` stream cache uses — generalized here to a
//! lock-free map since this cache sits on the hot path of every knowledge
//! and settings read.

use std::sync::Arc;

use dashmap::DashMap;

use crate::models::cache::{CacheAspect, CacheEntry};

/// Per-aspect enable flag and TTL override.
#[derive(Debug, Clone)]
pub struct AspectConfig {
    pub enabled: bool,
    pub ttl: std::time::Duration,
}

impl AspectConfig {
    fn for_aspect(aspect: CacheAspect) -> Self {
        Self {
            enabled: true,
            ttl: aspect.default_ttl(),
        }
    }
}

/// Configuration for all three aspects, plus a master enable switch.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub global_enabled: bool,
    pub knowledge: AspectConfig,
    pub settings: AspectConfig,
    pub workflow_definitions: AspectConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            global_enabled: true,
            knowledge: AspectConfig::for_aspect(CacheAspect::Knowledge),
            settings: AspectConfig::for_aspect(CacheAspect::Settings),
            workflow_definitions: AspectConfig::for_aspect(CacheAspect::WorkflowDefinitions),
        }
    }
}

impl CacheConfig {
    fn aspect_config(&self, aspect: CacheAspect) -> &AspectConfig {
        match aspect {
            CacheAspect::Knowledge => &self.knowledge,
            CacheAspect::Settings => &self.settings,
            CacheAspect::WorkflowDefinitions => &self.workflow_definitions,
        }
    }

    fn enabled(&self, aspect: CacheAspect) -> bool {
        self.global_enabled && self.aspect_config(aspect).enabled
    }

    fn ttl(&self, aspect: CacheAspect) -> std::time::Duration {
        self.aspect_config(aspect).ttl
    }
}

/// Concurrent TTL cache. Cache keys already encode the full scope tuple
/// (tenant/agent/activation/name and similar) — callers build those keys,
/// this type only owns expiry and enable-flag bookkeeping.
pub struct Cache<V: Clone + Send + Sync + 'static> {
    config: CacheConfig,
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    pub fn new(config: CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            entries: DashMap::new(),
        })
    }

    /// Returns the cached value if present, enabled for its aspect, and not
    /// expired.
    pub fn get(&self, aspect: CacheAspect, key: &str) -> Option<V> {
        if !self.config.enabled(aspect) {
            return None;
        }
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// No-op if the aspect is disabled (globally or individually) — a
    /// disabled aspect must skip writes as well as reads (§4.5).
    pub fn put(&self, aspect: CacheAspect, key: impl Into<String>, value: V) {
        if !self.config.enabled(aspect) {
            return;
        }
        let ttl = self.config.ttl(aspect);
        self.entries.insert(key.into(), CacheEntry::new(value, aspect, ttl));
    }

    /// Mutations on the underlying resource must invalidate the
    /// corresponding key.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|k, _| !k.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_aspect_skips_reads_and_writes() {
        let mut config = CacheConfig::default();
        config.knowledge.enabled = false;
        let cache: Arc<Cache<String>> = Cache::new(config);

        cache.put(CacheAspect::Knowledge, "k", "v".to_string());
        assert_eq!(cache.get(CacheAspect::Knowledge, "k"), None);
    }

    #[test]
    fn globally_disabled_skips_every_aspect() {
        let mut config = CacheConfig::default();
        config.global_enabled = false;
        let cache: Arc<Cache<String>> = Cache::new(config);

        cache.put(CacheAspect::Settings, "k", "v".to_string());
        assert_eq!(cache.get(CacheAspect::Settings, "k"), None);
    }

    #[test]
    fn invalidate_forces_next_read_to_miss() {
        let cache: Arc<Cache<String>> = Cache::new(CacheConfig::default());
        cache.put(CacheAspect::Knowledge, "k", "v1".to_string());
        assert_eq!(cache.get(CacheAspect::Knowledge, "k"), Some("v1".to_string()));

        cache.invalidate("k");
        assert_eq!(cache.get(CacheAspect::Knowledge, "k"), None);
    }

    #[test]
    fn expired_entry_is_treated_as_a_miss() {
        let mut config = CacheConfig::default();
        config.knowledge.ttl = std::time::Duration::from_millis(1);
        let cache: Arc<Cache<String>> = Cache::new(config);

        cache.put(CacheAspect::Knowledge, "k", "v".to_string());
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(cache.get(CacheAspect::Knowledge, "k"), None);
    }
}
