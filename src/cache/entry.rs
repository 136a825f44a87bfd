//! Stored cache entry with its absolute expiry instant.

use std::time::Duration;

use tokio::time::Instant;

/// A cached value and the instant after which it may no longer be returned.
#[derive(Clone, Debug)]
pub(crate) struct CacheEntry<V> {
    pub(crate) value: V,
    pub(crate) expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Creates an entry expiring `ttl` after `now`.
    ///
    /// A zero `ttl` produces an entry that is already expired: it occupies a
    /// slot until swept or read, but is never observable through `get`.
    pub(crate) fn new(value: V, now: Instant, ttl: Duration) -> Self {
        let expires_at = now.checked_add(ttl).unwrap_or_else(|| far_future(now));
        Self { value, expires_at }
    }

    /// Whether the entry is past its expiry at `now`.
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Clamp for TTLs too large to represent as an `Instant`.
fn far_future(now: Instant) -> Instant {
    // ~30 years; effectively "never expires" for a desktop session.
    now + Duration::from_secs(60 * 60 * 24 * 365 * 30)
}
