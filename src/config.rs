//! # Service configuration.
//!
//! [`BusConfig`] and [`CacheConfig`] centralize the tunables for the two
//! background services: the bus shutdown grace period and the cache sweep
//! interval.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use storecore::{BusConfig, CacheConfig};
//!
//! let mut bus_cfg = BusConfig::default();
//! bus_cfg.grace = Duration::from_secs(10);
//!
//! let mut cache_cfg = CacheConfig::default();
//! cache_cfg.sweep_interval = Duration::from_secs(30);
//!
//! assert_eq!(cache_cfg.sweep_interval, Duration::from_secs(30));
//! ```

use std::time::Duration;

/// Configuration for the event bus.
///
/// Controls how long [`EventBus::stop`](crate::EventBus::stop) waits for the
/// dispatcher worker to exit before aborting it.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Maximum time to wait for the dispatcher to finish its in-flight
    /// handler and exit during `stop`.
    pub grace: Duration,
}

impl Default for BusConfig {
    /// Provides a default configuration:
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
        }
    }
}

/// Configuration for the TTL cache.
///
/// Controls how often the background sweeper scans for expired entries.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Interval between background sweeps of expired entries.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    /// Provides a default configuration:
    /// - `sweep_interval = 60s`
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
        }
    }
}
