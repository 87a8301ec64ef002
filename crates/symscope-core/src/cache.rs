//! # Caching Primitives
//!
//! Memoization cells used by the type and value layers.
//!
//! Two kinds of facts are cached:
//!
//! - **Type metadata** (names, sizes, field and base class maps) never changes
//!   during a session. It lives in `once_cell::sync::OnceCell` cells and in
//!   [`DictionaryCache`] maps that are never cleared.
//! - **Memory-derived facts** (data words, runtime types, strings, the region
//!   list) go stale as soon as a live target runs again. They live in
//!   [`EpochCell`] cells stamped with the [`CacheEpoch`] of their process, so
//!   advancing the epoch drops all of them at once without visiting them.
//!
//! No cell ever stores a failed computation. A failing initializer leaves the
//! cell empty and the next access tries again.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Generation counter for memory-derived caches of one process
///
/// Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct CacheEpoch(Arc<AtomicU64>);

impl CacheEpoch
{
    /// Create a counter starting at generation 0
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Current generation
    #[must_use]
    pub fn current(&self) -> u64
    {
        self.0.load(Ordering::Acquire)
    }

    /// Start a new generation, making every [`EpochCell`] stamped with an
    /// older one look empty. Returns the new generation.
    pub fn advance(&self) -> u64
    {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Lazily computed value that is valid for one cache generation
///
/// ## Example
///
/// ```rust
/// use symscope_core::cache::{CacheEpoch, EpochCell};
///
/// let epoch = CacheEpoch::new();
/// let cell = EpochCell::new();
///
/// let value = cell.get_or_try_init(epoch.current(), || Ok::<_, ()>(42)).unwrap();
/// assert_eq!(value, 42);
///
/// epoch.advance();
/// assert_eq!(cell.get(epoch.current()), None);
/// ```
pub struct EpochCell<T>
{
    slot: RwLock<Option<(u64, T)>>,
}

impl<T> Default for EpochCell<T>
{
    fn default() -> Self
    {
        Self { slot: RwLock::new(None) }
    }
}

impl<T: fmt::Debug> fmt::Debug for EpochCell<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_tuple("EpochCell").field(&*slot).finish()
    }
}

impl<T: Clone> EpochCell<T>
{
    /// Create an empty cell
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Get the cached value if it was computed during `epoch`
    pub fn get(&self, epoch: u64) -> Option<T>
    {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            Some((stamp, value)) if *stamp == epoch => Some(value.clone()),
            _ => None,
        }
    }

    /// Get the cached value or compute it
    ///
    /// The initializer runs without holding the lock. If two threads race,
    /// both compute and the first one to store wins, so every caller observes
    /// the same value for a given epoch.
    ///
    /// ## Errors
    ///
    /// Returns the initializer's error. Nothing is cached in that case.
    pub fn get_or_try_init<E>(&self, epoch: u64, init: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    {
        if let Some(value) = self.get(epoch) {
            return Ok(value);
        }

        let value = init()?;
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            Some((stamp, existing)) if *stamp == epoch => Ok(existing.clone()),
            _ => {
                *slot = Some((epoch, value.clone()));
                Ok(value)
            }
        }
    }
}

/// Keyed memoization map
///
/// Entries are only ever added; [`DictionaryCache::clear`] exists for the
/// process-wide invalidation path.
pub struct DictionaryCache<K, V>
{
    map: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for DictionaryCache<K, V>
{
    fn default() -> Self
    {
        Self { map: RwLock::new(HashMap::new()) }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for DictionaryCache<K, V>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_map().entries(map.iter()).finish()
    }
}

impl<K: Eq + Hash, V: Clone> DictionaryCache<K, V>
{
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Look up a cached entry
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.map.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    /// Get the entry for `key` or compute and store it
    ///
    /// The initializer runs without holding the lock; the first stored value
    /// wins if two callers race.
    ///
    /// ## Errors
    ///
    /// Returns the initializer's error. Nothing is cached in that case.
    pub fn get_or_try_insert_with<E>(&self, key: K, init: impl FnOnce() -> Result<V, E>) -> Result<V, E>
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let value = init()?;
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        Ok(map.entry(key).or_insert(value).clone())
    }

    /// Store an entry unless one is already present, returning the stored value
    pub fn insert(&self, key: K, value: V) -> V
    {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(key).or_insert(value).clone()
    }

    /// Drop every entry
    pub fn clear(&self)
    {
        self.map.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Number of cached entries
    pub fn len(&self) -> usize
    {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` if nothing is cached
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }
}
