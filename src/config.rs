//! Configuration for the mapper, its metadata cache and the persistence engine.

use std::time::Duration;

/// How `relate` treats the relationship multiplicity flags.
///
/// # Default Behavior
///
/// The default is [`RelatePolicy::Enforced`], so a declaration that forbids
/// parallel edges is honored without extra work at the call site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RelatePolicy {
    /// `relate` merges without looking at the multiplicity flags.
    ///
    /// Callers are expected to consult `narity` themselves.
    Advisory,

    /// `relate` checks `same_node_multiple_allowed` and `multiple_allowed`
    /// inside its own unit of work and rejects with `ActionAlreadyPerformed`.
    #[default]
    Enforced,
}

/// Options for the [`crate::memoizer::Memoizer`].
///
/// ```rust
/// use cyphervector::CacheConfig;
/// let config = CacheConfig::default();
/// assert!(config.enabled);
/// assert_eq!(config.metadata_ttl.as_secs(), 86_400);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Whether memoized values are stored at all
    ///
    /// **Default:** `true`
    ///
    /// When `false`, every lookup runs its computation.
    pub enabled: bool,

    /// Lifetime of unpacked vector and node metadata
    ///
    /// **Default:** one day
    pub metadata_ttl: Duration,

    /// Number of slots after which an insert first sweeps expired entries
    ///
    /// **Default:** `1024`
    pub sweep_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metadata_ttl: Duration::from_secs(24 * 60 * 60),
            sweep_threshold: 1024,
        }
    }
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_metadata_ttl(mut self, ttl: Duration) -> Self {
        self.metadata_ttl = ttl;
        self
    }
}

/// Top-level configuration handed to [`crate::service::GraphService`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapperConfig {
    pub cache: CacheConfig,

    /// Page size of searches created through `GraphService::new_search`
    ///
    /// **Default:** `60`
    pub default_page_rows: i64,

    /// **Default:** [`RelatePolicy::Enforced`]
    pub relate_policy: RelatePolicy,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            default_page_rows: 60,
            relate_policy: RelatePolicy::default(),
        }
    }
}

impl MapperConfig {
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_relate_policy(mut self, policy: RelatePolicy) -> Self {
        self.relate_policy = policy;
        self
    }
}
