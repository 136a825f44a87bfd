//! Hit/miss accounting for the cache.

use std::time::SystemTime;

use serde::Serialize;

/// Point-in-time snapshot of cache effectiveness.
///
/// `hits + misses` equals the number of `get` calls since construction or the
/// last `clear`. Suitable for a diagnostics screen or structured logs.
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    /// `get` calls answered from an unexpired entry.
    pub hits: u64,
    /// `get` calls that found nothing, or found an expired entry.
    pub misses: u64,
    /// Total `get` calls: `hits + misses`.
    pub total: u64,
    /// `hits / total`, or `0.0` before any `get`.
    pub hit_rate: f64,
    /// Entries currently stored, including expired ones not yet swept or
    /// lazily removed.
    pub item_count: usize,
    /// Wall-clock time of the last completed background sweep.
    pub last_sweep: Option<SystemTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_for_diagnostics() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            total: 4,
            hit_rate: 0.75,
            item_count: 2,
            last_sweep: None,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["hits"], 3);
        assert_eq!(json["hit_rate"], 0.75);
    }
}
