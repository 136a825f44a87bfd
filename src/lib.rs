//! # storecore
//!
//! **storecore** provides the two process-wide infrastructure services of a
//! shop-management application: an event bus (publish/subscribe with a single
//! asynchronous dispatcher) and a TTL cache (expiring key-value store with
//! background eviction).
//!
//! Both services run one dedicated background worker, are shared across
//! arbitrary caller threads, and keep every caller-facing operation
//! non-blocking: publishing never waits on handlers, and cache calls return
//! in bounded time.
//!
//! ## Architecture
//! ```text
//! managers (inventory, sales, customers, reports)
//!     │ publish(type, payload)              │ get / set / delete
//!     ▼                                     ▼
//! ┌───────────────────────────┐   ┌───────────────────────────┐
//! │ EventBus                  │   │ TtlCache                  │
//! │ - unbounded publish queue │   │ - Mutex<map + counters>   │
//! │ - per-type registry       │   │ - lazy expiry on read     │
//! └──────┬────────────────────┘   └──────┬────────────────────┘
//!        ▼ dispatcher worker             ▼ sweeper worker
//!   snapshot subscribers, invoke     interval pass dropping
//!   in registration order            entries past their deadline
//!   (UI refresh, logging, managers)
//! ```
//!
//! Both services are constructed once during application bootstrap and passed
//! explicitly (typically behind an `Arc`) to every component that needs them;
//! nothing is resolved through hidden global state, so lifetime, testing, and
//! shutdown stay explicit.
//!
//! ## Guarantees
//! | Area          | Description                                                       | Key types / traits              |
//! |---------------|-------------------------------------------------------------------|---------------------------------|
//! | **Ordering**  | One dispatcher, one queue: delivery follows global publish order. | [`Event::seq`]                  |
//! | **Isolation** | A failing or panicking handler is logged; the pass continues.     | [`Subscriber`], [`HandlerError`]|
//! | **Expiry**    | An expired entry is never observable, swept or not.               | [`TtlCache`]                    |
//! | **Accounting**| `hits + misses` equals `get` calls since the last `clear`.        | [`CacheStats`]                  |
//! | **Lifecycle** | Explicit start/stop; workers are joinable, restart is permitted.  | [`EventBus`], [`RuntimeError`]  |
//!
//! Delivery is best-effort and ephemeral: events are in-process signals, not
//! durable messages. Anything still queued when `stop` completes is dropped.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use serde_json::{json, Value};
//! use storecore::{BusConfig, CacheConfig, EventBus, HandlerError, SubscriberFn, TtlCache};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     // Constructed once at bootstrap, passed to whatever needs them.
//!     let bus = Arc::new(EventBus::new(BusConfig::default()));
//!     let cache: Arc<TtlCache<String, u64>> = Arc::new(TtlCache::new(CacheConfig::default()));
//!
//!     bus.subscribe(
//!         "sale.created",
//!         SubscriberFn::arc("refresh-dashboard", |payload: Value| async move {
//!             println!("refresh dashboard for sale {}", payload["id"]);
//!             Ok::<_, HandlerError>(())
//!         }),
//!     );
//!     bus.start();
//!
//!     cache.set("report.daily".to_string(), 42, Duration::from_secs(60));
//!     bus.publish("sale.created", json!({ "id": 1 }));
//!
//!     bus.stop().await.ok();
//!     cache.stop().await;
//! }
//! ```

mod bus;
mod cache;
mod config;
mod error;

// ---- Public re-exports ----

pub use bus::{Event, EventBus, Subscriber, SubscriberFn, SubscriberRef, SubscriptionId};
pub use cache::{CacheStats, TtlCache};
pub use config::{BusConfig, CacheConfig};
pub use error::{HandlerError, RuntimeError};
