//! `CacheEntry` and the three cacheable aspects of §4.5.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three independently enable/TTL-configurable caching aspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheAspect {
    Knowledge,
    Settings,
    WorkflowDefinitions,
}

impl CacheAspect {
    /// Default TTL per aspect: 5 min, 5 min, 60 min respectively (§4.5).
    pub fn default_ttl(self) -> std::time::Duration {
        match self {
            CacheAspect::Knowledge => std::time::Duration::from_secs(5 * 60),
            CacheAspect::Settings => std::time::Duration::from_secs(5 * 60),
            CacheAspect::WorkflowDefinitions => std::time::Duration::from_secs(60 * 60),
        }
    }
}

/// One entry in the TTL cache. Served only while `Utc::now() <
/// absolute_expiry`.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub aspect: CacheAspect,
    pub absolute_expiry: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, aspect: CacheAspect, ttl: std::time::Duration) -> Self {
        let absolute_expiry = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));
        Self {
            value,
            aspect,
            absolute_expiry,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.absolute_expiry
    }
}
