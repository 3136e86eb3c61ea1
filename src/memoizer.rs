//! Keyed, TTL-bounded memoization with single-flight computation.
//!
//! The slot map lock is held only to find or create a per-key once-cell; the
//! computation itself runs outside it, and concurrent callers of the same key
//! wait on that cell instead of computing again.

use std::any::Any;
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::errors::GraphMapError;
use crate::metadata::{HyperVectorMeta, NodeMeta, RelationMeta, TypeTag, VectorMeta};
use crate::outcome::Outcome;

/// Decides whether a computed value may be stored.
///
/// "Empty" values (None, empty collections, zero, false, unsuccessful
/// outcomes) are returned to the caller but never cached.
pub trait Memoizable {
    fn is_cacheable(&self) -> bool;
}

impl<T> Memoizable for Option<T> {
    fn is_cacheable(&self) -> bool {
        self.is_some()
    }
}

impl<T> Memoizable for Vec<T> {
    fn is_cacheable(&self) -> bool {
        !self.is_empty()
    }
}

impl Memoizable for String {
    fn is_cacheable(&self) -> bool {
        !self.is_empty()
    }
}

impl Memoizable for bool {
    fn is_cacheable(&self) -> bool {
        *self
    }
}

macro_rules! memoizable_number {
    ($($ty:ty),*) => {
        $(impl Memoizable for $ty {
            fn is_cacheable(&self) -> bool {
                *self != 0
            }
        })*
    };
}

memoizable_number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<T: Memoizable + ?Sized> Memoizable for Arc<T> {
    fn is_cacheable(&self) -> bool {
        (**self).is_cacheable()
    }
}

impl<T> Memoizable for Outcome<T> {
    fn is_cacheable(&self) -> bool {
        self.is_success()
    }
}

macro_rules! memoizable_always {
    ($($ty:ty),*) => {
        $(impl Memoizable for $ty {
            fn is_cacheable(&self) -> bool {
                true
            }
        })*
    };
}

memoizable_always!(VectorMeta, HyperVectorMeta, NodeMeta, RelationMeta);

/// Identity of a memoized computation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: Cow<'static, str>,
    subject: Option<TypeTag>,
    params: String,
}

impl CacheKey {
    pub fn new(operation: impl Into<Cow<'static, str>>) -> Self {
        Self {
            operation: operation.into(),
            subject: None,
            params: String::new(),
        }
    }

    pub fn for_type<T: 'static>(operation: impl Into<Cow<'static, str>>) -> Self {
        Self::new(operation).with_tag(TypeTag::of::<T>())
    }

    pub fn with_tag(mut self, tag: TypeTag) -> Self {
        self.subject = Some(tag);
        self
    }

    /// Adds the discriminating parameters, serialized as JSON.
    pub fn with_params<P: Serialize + ?Sized>(mut self, params: &P) -> Result<Self, GraphMapError> {
        self.params = serde_json::to_string(params)
            .map_err(|e| GraphMapError::invalid_input(format!("cache key params: {e}")))?;
        Ok(self)
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn subject(&self) -> Option<TypeTag> {
        self.subject
    }

    pub fn params(&self) -> &str {
        &self.params
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct Stamped<T> {
    value: T,
    expires_at: Instant,
}

/// Why a once-cell was left empty.
enum Fill<T, E> {
    Failed(E),
    Uncacheable(T),
}

trait SlotCell: Send + Sync {
    /// `None` while the cell is empty or being filled.
    fn expires_at(&self) -> Option<Instant>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

struct AsyncCell<T>(tokio::sync::OnceCell<Stamped<T>>);

impl<T: Send + Sync + 'static> SlotCell for AsyncCell<T> {
    fn expires_at(&self) -> Option<Instant> {
        self.0.get().map(|stamped| stamped.expires_at)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct SyncCell<T>(once_cell::sync::OnceCell<Stamped<T>>);

impl<T: Send + Sync + 'static> SlotCell for SyncCell<T> {
    fn expires_at(&self) -> Option<Instant> {
        self.0.get().map(|stamped| stamped.expires_at)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

fn is_expired(cell: &dyn SlotCell, now: Instant) -> bool {
    cell.expires_at().is_some_and(|at| at <= now)
}

pub struct Memoizer {
    enabled: bool,
    sweep_threshold: usize,
    slots: Mutex<AHashMap<CacheKey, Arc<dyn SlotCell>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for Memoizer {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl Memoizer {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            sweep_threshold: config.sweep_threshold.max(1),
            slots: Mutex::new(AHashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the live cell of type `C` for `key`, creating or replacing it
    /// when missing, expired, or holding another value type.
    fn cell<C, F>(&self, key: &CacheKey, make: F) -> Arc<C>
    where
        C: SlotCell + 'static,
        F: FnOnce() -> C,
    {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        if let Some(existing) = slots.get(key) {
            if !is_expired(existing.as_ref(), now) {
                if let Ok(cell) = Arc::clone(existing).into_any().downcast::<C>() {
                    return cell;
                }
            }
        }
        if slots.len() >= self.sweep_threshold {
            slots.retain(|_, slot| !is_expired(slot.as_ref(), now));
        }
        let cell = Arc::new(make());
        slots.insert(key.clone(), Arc::clone(&cell) as Arc<dyn SlotCell>);
        cell
    }

    /// Drops `key` if it still maps to `cell` and that cell never got a value.
    fn discard_empty(&self, key: &CacheKey, cell: &Arc<dyn SlotCell>) {
        let mut slots = self.slots.lock();
        let stale = slots
            .get(key)
            .is_some_and(|slot| {
                std::ptr::addr_eq(Arc::as_ptr(slot), Arc::as_ptr(cell)) && slot.expires_at().is_none()
            });
        if stale {
            slots.remove(key);
        }
    }

    fn record(&self, computed: bool, key: &CacheKey) {
        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                target: "cyphervector::memo",
                operation = %key.operation,
                subject = ?key.subject,
                "memo.populate"
            );
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Synchronous memoization.
    ///
    /// Concurrent callers of the same key block until the first computation
    /// finishes. Errors and non-cacheable values are returned without being
    /// stored.
    pub fn get_or_compute<T, E, F>(&self, key: &CacheKey, ttl: Duration, compute: F) -> Result<T, E>
    where
        T: Memoizable + Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        if !self.enabled {
            return compute();
        }
        let cell = self.cell(key, || SyncCell::<T>(once_cell::sync::OnceCell::new()));
        let computed = AtomicBool::new(false);
        let filled = cell.0.get_or_try_init(|| {
            computed.store(true, Ordering::Relaxed);
            match compute() {
                Ok(value) if value.is_cacheable() => Ok(Stamped {
                    value,
                    expires_at: Instant::now() + ttl,
                }),
                Ok(value) => Err(Fill::Uncacheable(value)),
                Err(err) => Err(Fill::Failed(err)),
            }
        });
        let filled = filled.map(|stamped| stamped.value.clone());
        self.record(computed.load(Ordering::Relaxed), key);
        match filled {
            Ok(value) => Ok(value),
            Err(fill) => {
                let slot: Arc<dyn SlotCell> = cell;
                self.discard_empty(key, &slot);
                match fill {
                    Fill::Uncacheable(value) => Ok(value),
                    Fill::Failed(err) => Err(err),
                }
            }
        }
    }

    /// Asynchronous memoization with the same guarantees as [`Self::get_or_compute`].
    ///
    /// Concurrent callers of the same key await one computation.
    pub async fn get_or_compute_async<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Memoizable + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.enabled {
            return compute().await;
        }
        let cell = self.cell(key, || AsyncCell::<T>(tokio::sync::OnceCell::new()));
        let computed = AtomicBool::new(false);
        let filled = cell
            .0
            .get_or_try_init(|| async {
                computed.store(true, Ordering::Relaxed);
                match compute().await {
                    Ok(value) if value.is_cacheable() => Ok(Stamped {
                        value,
                        expires_at: Instant::now() + ttl,
                    }),
                    Ok(value) => Err(Fill::Uncacheable(value)),
                    Err(err) => Err(Fill::Failed(err)),
                }
            })
            .await
            .map(|stamped| stamped.value.clone());
        self.record(computed.load(Ordering::Relaxed), key);
        match filled {
            Ok(value) => Ok(value),
            Err(fill) => {
                let slot: Arc<dyn SlotCell> = cell;
                self.discard_empty(key, &slot);
                match fill {
                    Fill::Uncacheable(value) => Ok(value),
                    Fill::Failed(err) => Err(err),
                }
            }
        }
    }

    /// Removes `key`. A no-op when absent.
    pub fn invalidate(&self, key: &CacheKey) {
        if self.slots.lock().remove(key).is_some() {
            tracing::debug!(
                target: "cyphervector::memo",
                operation = %key.operation,
                subject = ?key.subject,
                "memo.invalidate"
            );
        }
    }

    /// Removes every parameter variant of `operation` memoized for `tag`.
    pub fn invalidate_subject(&self, operation: &str, tag: TypeTag) {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|key, _| !(key.operation == operation && key.subject == Some(tag)));
        let removed = before - slots.len();
        if removed > 0 {
            tracing::debug!(
                target: "cyphervector::memo",
                operation,
                subject = %tag,
                removed,
                "memo.invalidate"
            );
        }
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| !is_expired(slot.as_ref(), now));
        before - slots.len()
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.slots.lock().len();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}
