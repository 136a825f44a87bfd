//! # Expiring key-value store with background eviction.
//!
//! [`TtlCache`] lets managers skip recomputing expensive values (report
//! aggregates, lookup tables) for a bounded time. Entries expire on an
//! absolute deadline; a background sweeper evicts stale ones so the map does
//! not grow unbounded between reads.
//!
//! ## Architecture
//! ```text
//! get / set / delete / clear / stats        (any thread, bounded time)
//!         │
//!         ▼
//! ┌── Mutex<State> ──────────────────────────┐
//! │  entries: HashMap<K, CacheEntry<V>>      │◄── sweeper worker
//! │  hits / misses / last_sweep              │    (fixed interval, same lock)
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - **Lazy expiry on read**: an expired entry is never returned, even if the
//!   sweeper has not visited it yet; the read deletes it and counts a miss.
//! - **Coarse lock**: one mutex guards the map and the counters; call volume
//!   is bounded by UI/business-logic rates, so correctness and simplicity win
//!   over throughput here.
//! - **No errors**: every input (missing keys, expired entries, zero TTLs)
//!   maps to a miss or a no-op, never a failure.
//! - **Last set wins** per key, immediately visible to every thread.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::entry::CacheEntry;
use crate::cache::stats::CacheStats;
use crate::config::CacheConfig;

/// Map, counters, and sweep bookkeeping behind the single cache lock.
struct State<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    last_sweep: Option<SystemTime>,
}

/// Shared between the cache handle and its sweeper worker.
struct Inner<K, V> {
    state: Mutex<State<K, V>>,
}

impl<K: Eq + Hash, V> Inner<K, V> {
    fn lock(&self) -> MutexGuard<'_, State<K, V>> {
        match self.state.lock() {
            // A poisoned lock still holds consistent state: every mutation
            // completes before its guard drops.
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Removes every expired entry; returns how many were dropped.
    fn sweep(&self) -> usize {
        let mut guard = self.lock();
        let state = &mut *guard;
        let now = Instant::now();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        state.last_sweep = Some(SystemTime::now());
        before - state.entries.len()
    }
}

/// Process-wide expiring key-value store.
///
/// Constructed once during application bootstrap and passed by reference
/// (typically behind an `Arc`) to every component that reads or writes
/// through it; there is no global lookup. Dropping the cache cancels the
/// sweeper.
///
/// ### Lifecycle
/// The sweeper worker starts at construction and runs until
/// [`TtlCache::stop`] or drop; `new` must be called from within a Tokio
/// runtime.
pub struct TtlCache<K, V> {
    inner: Arc<Inner<K, V>>,
    token: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    /// Creates a new cache and spawns its sweeper worker.
    pub fn new(cfg: CacheConfig) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                last_sweep: None,
            }),
        });
        let token = CancellationToken::new();
        let handle = tokio::spawn(sweeper_loop(
            Arc::downgrade(&inner),
            token.clone(),
            cfg.sweep_interval,
        ));
        Self {
            inner,
            token,
            sweeper: Mutex::new(Some(handle)),
        }
    }

    /// Returns the value for `key` if present and unexpired.
    ///
    /// An unexpired entry counts a hit. A missing key counts a miss. A
    /// present-but-expired entry is deleted as a side effect of the read and
    /// also counts a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let now = Instant::now();
        let value = match state.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                state.entries.remove(key);
                None
            }
            None => None,
        };
        match value {
            Some(value) => {
                state.hits += 1;
                Some(value)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Stores `value` under `key`, expiring `ttl` from now.
    ///
    /// Replaces any previous entry for the key. A zero `ttl` stores an entry
    /// that is already expired and will never be returned by
    /// [`TtlCache::get`].
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let mut guard = self.inner.lock();
        guard
            .entries
            .insert(key, CacheEntry::new(value, Instant::now(), ttl));
    }

    /// Removes the entry for `key`; returns whether anything was removed.
    ///
    /// Does not touch the hit/miss counters.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().entries.remove(key).is_some()
    }

    /// Removes all entries and resets the hit/miss counters to zero.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.entries.clear();
        guard.hits = 0;
        guard.misses = 0;
    }

    /// Returns a snapshot of the cache counters and size.
    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.lock();
        let total = guard.hits + guard.misses;
        CacheStats {
            hits: guard.hits,
            misses: guard.misses,
            total,
            hit_rate: if total == 0 {
                0.0
            } else {
                guard.hits as f64 / total as f64
            },
            item_count: guard.entries.len(),
            last_sweep: guard.last_sweep,
        }
    }

    /// Signals the sweeper to exit and waits for it.
    ///
    /// Idempotent. Cached entries remain readable after stop; only the
    /// background eviction ends.
    pub async fn stop(&self) {
        self.token.cancel();
        let handle = self.sweeper_slot().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn sweeper_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.sweeper.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<K, V> Drop for TtlCache<K, V> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Sweeper loop: wakes on a fixed interval and evicts expired entries.
///
/// Holds only a `Weak` reference, so a dropped cache ends the worker even if
/// the cancel signal is never observed.
async fn sweeper_loop<K, V>(inner: Weak<Inner<K, V>>, token: CancellationToken, interval: Duration)
where
    K: Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                let Some(inner) = inner.upgrade() else { break };
                let removed = inner.sweep();
                if removed > 0 {
                    debug!(removed, "sweep removed expired entries");
                }
            }
        }
    }
}
